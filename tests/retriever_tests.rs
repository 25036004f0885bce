//! Integration tests for installing the latest mod release from GitHub
//!
//! The mock server serves both the release API and the tag source archive.

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::json;
use std::fs;
use std::io::{Cursor, Write};
use tempfile::TempDir;
use trowmod_switcher::models::NetworkSettings;
use trowmod_switcher::services::{BuildOrchestrator, MarkerStatus, ModRetriever, VersionMarker};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::SimpleFileOptions;

const MOD_REPO: &str = "SymoniusGit/TROWMod";

fn utf8_temp_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, path)
}

/// Source archive laid out like GitHub's tag downloads: one `TROWMod-<tag>/` folder
fn tag_archive(top: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    let files = [
        ("data/ini/weapon.ini", "Weapon TrowSword\nEnd\n"),
        ("arts/asset.dat", "MOD ASSET"),
        ("lang/englishpatch201.str", "TROW:Hero\n"),
        ("scripts/skirmishscripts.scb", "SCB"),
    ];
    for (name, contents) in files {
        writer
            .start_file(format!("{}/{}", top, name), options)
            .unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn create_game_dir(root: &Utf8Path) {
    fs::write(root.join("lotrbfme2ep1.exe"), "MZ").unwrap();
    fs::write(root.join("asset.dat"), "ORIGINAL ASSET").unwrap();
    fs::create_dir_all(root.join("lang")).unwrap();
}

fn retriever_for(server: &MockServer) -> ModRetriever {
    let settings = NetworkSettings {
        api_base_url: server.uri(),
        github_base_url: server.uri(),
        request_timeout_secs: 5,
        download_timeout_secs: 10,
        ..NetworkSettings::default()
    };
    ModRetriever::new(&settings, BuildOrchestrator::new()).unwrap()
}

#[tokio::test]
async fn test_install_latest_release() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/repos/{}/releases/latest", MOD_REPO)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tag_name": "v2.1",
            "assets": []
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{}/archive/refs/tags/v2.1.zip", MOD_REPO)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(tag_archive("TROWMod-2.1")))
        .mount(&server)
        .await;

    let (_game_guard, game) = utf8_temp_dir();
    create_game_dir(&game);

    let report = retriever_for(&server)
        .install_latest(MOD_REPO, &game)
        .await
        .unwrap();

    assert!(report.success(), "build failed: {:?}", report);
    assert_eq!(
        VersionMarker::read(&game),
        MarkerStatus::Installed("v2.1".to_string())
    );
    assert!(game.join("!TROWMOD_INI.big").is_file());
    assert!(game.join("lang/!TROWMOD_ITLANG.big").is_file());
    assert_eq!(fs::read_to_string(game.join("asset.dat")).unwrap(), "MOD ASSET");
}

#[tokio::test]
async fn test_unknown_latest_release_installs_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let (_game_guard, game) = utf8_temp_dir();
    create_game_dir(&game);

    let result = retriever_for(&server).install_latest(MOD_REPO, &game).await;

    assert!(result.is_err());
    assert_eq!(VersionMarker::read(&game), MarkerStatus::Missing);
    assert_eq!(
        fs::read_to_string(game.join("asset.dat")).unwrap(),
        "ORIGINAL ASSET"
    );
}

#[tokio::test]
async fn test_missing_source_archive_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/repos/{}/releases/latest", MOD_REPO)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tag_name": "v2.1"})))
        .mount(&server)
        .await;

    let (_game_guard, game) = utf8_temp_dir();
    create_game_dir(&game);

    let result = retriever_for(&server).install_latest(MOD_REPO, &game).await;

    let message = format!("{:#}", result.unwrap_err());
    assert!(message.contains("404"), "unexpected error: {}", message);
    assert_eq!(VersionMarker::read(&game), MarkerStatus::Missing);
}
