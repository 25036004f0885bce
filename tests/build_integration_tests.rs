//! Integration tests for installing and removing the mod
//!
//! These tests verify:
//! - A full build over `data/ arts/ lang/ scripts/` produces every archive and the marker
//! - An induced failure leaves the marker alone and keeps the other archives
//! - Removal deletes everything it built and restores `asset.dat`
//! - Removal is idempotent

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;
use trowmod_switcher::archive::BigReader;
use trowmod_switcher::services::{
    BuildOrchestrator, BuildTask, MarkerStatus, ModFileManager, RestoreOutcome, VersionMarker,
};

fn utf8_temp_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, path)
}

fn write(path: &Utf8Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// A minimal mod checkout with every subtree the standard tasks expect
fn create_mod_source(root: &Utf8Path) {
    write(&root.join("data/ini/weapon.ini"), "Weapon TrowSword\nEnd\n");
    write(&root.join("data/ini/object/hero.ini"), "Object TrowHero\nEnd\n");
    write(&root.join("arts/asset.dat"), "MOD ASSET");
    write(&root.join("arts/textures/trow_hero.tga"), "TGA");
    write(&root.join("lang/englishpatch201.str"), "TROW:Hero\n\"Hero\"\nEND\n");
    write(&root.join("scripts/skirmishscripts.scb"), "SCB");
}

fn create_game_dir(root: &Utf8Path) {
    write(&root.join("lotrbfme2ep1.exe"), "MZ");
    write(&root.join("asset.dat"), "ORIGINAL ASSET");
    fs::create_dir_all(root.join("lang")).unwrap();
}

#[tokio::test]
async fn test_full_build_then_remove() {
    let (_src_guard, source) = utf8_temp_dir();
    let (_game_guard, game) = utf8_temp_dir();
    create_mod_source(&source);
    create_game_dir(&game);

    let orchestrator = BuildOrchestrator::new();
    let report = orchestrator.build_all(&source, &game, "v2.1").await.unwrap();

    assert!(report.success(), "build failed: {:?}", report);
    assert_eq!(report.results.len(), 4);
    for task in BuildTask::standard_set() {
        assert!(game.join(&task.output).is_file(), "{} missing", task.output);
    }
    assert_eq!(
        VersionMarker::read(&game),
        MarkerStatus::Installed("v2.1".to_string())
    );

    // INI keeps its data folder, the others are flattened
    let ini = BigReader::open(&game.join("!TROWMOD_INI.big")).unwrap();
    assert!(ini.names().contains(&"data\\ini\\weapon.ini"));
    let scripts = BigReader::open(&game.join("!TROWMOD_DATA1.big")).unwrap();
    assert_eq!(scripts.names(), vec!["skirmishscripts.scb"]);

    assert_eq!(fs::read_to_string(game.join("asset.dat")).unwrap(), "MOD ASSET");
    assert_eq!(
        fs::read_to_string(game.join("asset.dat.disabled")).unwrap(),
        "ORIGINAL ASSET"
    );

    let removal = ModFileManager::new().remove_all(&game).unwrap();
    assert!(removal.is_success());
    assert_eq!(removal.asset, RestoreOutcome::Restored);
    for relative in ModFileManager::new().manifest() {
        assert!(!game.join(relative).exists(), "{} left behind", relative);
    }
    assert_eq!(
        fs::read_to_string(game.join("asset.dat")).unwrap(),
        "ORIGINAL ASSET"
    );
    assert!(!game.join("asset.dat.disabled").exists());
    assert_eq!(VersionMarker::read(&game), MarkerStatus::Missing);
}

#[tokio::test]
async fn test_missing_subtree_keeps_previous_marker() {
    let (_src_guard, source) = utf8_temp_dir();
    let (_game_guard, game) = utf8_temp_dir();
    create_mod_source(&source);
    create_game_dir(&game);
    VersionMarker::new("v1.0").write(&game).unwrap();

    fs::remove_dir_all(source.join("scripts")).unwrap();

    let report = BuildOrchestrator::new()
        .build_all(&source, &game, "v2.0")
        .await
        .unwrap();

    assert!(!report.success());
    assert!(!report.marker_written);
    let failed: Vec<_> = report.failed().map(|r| r.task.as_str()).collect();
    assert_eq!(failed, vec!["DATA1"]);

    assert!(game.join("!TROWMOD_INI.big").is_file());
    assert!(game.join("!TROWMOD_ARTS.big").is_file());
    assert!(game.join("lang/!TROWMOD_ITLANG.big").is_file());
    assert!(!game.join("!TROWMOD_DATA1.big").exists());
    assert_eq!(
        VersionMarker::read(&game),
        MarkerStatus::Installed("v1.0".to_string())
    );
}

#[tokio::test]
async fn test_rebuild_overwrites_archives_and_marker() {
    let (_src_guard, source) = utf8_temp_dir();
    let (_game_guard, game) = utf8_temp_dir();
    create_mod_source(&source);
    create_game_dir(&game);

    let orchestrator = BuildOrchestrator::new();
    assert!(orchestrator.build_all(&source, &game, "v1").await.unwrap().success());

    write(&source.join("scripts/skirmishscripts.scb"), "SCB v2");
    assert!(orchestrator.build_all(&source, &game, "v2").await.unwrap().success());

    let scripts = BigReader::open(&game.join("!TROWMOD_DATA1.big")).unwrap();
    assert_eq!(scripts.read("skirmishscripts.scb").unwrap(), b"SCB v2");
    assert_eq!(VersionMarker::read(&game).version(), Some("v2"));
    assert_eq!(
        fs::read_to_string(game.join("asset.dat.disabled")).unwrap(),
        "ORIGINAL ASSET"
    );
}

#[test]
fn test_remove_twice_succeeds() {
    let (_game_guard, game) = utf8_temp_dir();
    create_game_dir(&game);

    let manager = ModFileManager::new();
    let first = manager.remove_all(&game).unwrap();
    let second = manager.remove_all(&game).unwrap();

    assert!(first.is_success());
    assert!(second.is_success());
    assert_eq!(second.asset, RestoreOutcome::NothingToRestore);
    // never touch asset.dat without a disabled original
    assert_eq!(
        fs::read_to_string(game.join("asset.dat")).unwrap(),
        "ORIGINAL ASSET"
    );
}

#[tokio::test]
async fn test_source_tree_is_not_modified() {
    let (_src_guard, source) = utf8_temp_dir();
    let (_game_guard, game) = utf8_temp_dir();
    create_mod_source(&source);
    create_game_dir(&game);

    BuildOrchestrator::new()
        .build_all(&source, &game, "v1")
        .await
        .unwrap();

    assert_eq!(
        fs::read_to_string(source.join("arts/asset.dat")).unwrap(),
        "MOD ASSET"
    );
    let mut leftovers: Vec<_> = fs::read_dir(&source)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    leftovers.sort();
    assert_eq!(leftovers, vec!["arts", "data", "lang", "scripts"]);
}
