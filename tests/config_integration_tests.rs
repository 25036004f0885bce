//! Integration tests for ConfigManager and configuration file handling
//!
//! These tests verify:
//! - Default configuration when no file exists
//! - Saving and reloading stored paths
//! - Partial files keep defaults for missing sections
//! - Integration with StateManager

use camino::Utf8PathBuf;
use std::fs;
use tempfile::TempDir;
use trowmod_switcher::config::USER_CONFIG_FILENAME;
use trowmod_switcher::{ConfigManager, PathKey, StateManager, UserConfig};

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert_eq!(manager.config_dir(), config_path.as_path());
    assert_eq!(
        manager.user_config_path(),
        config_path.join(USER_CONFIG_FILENAME).as_path()
    );
}

#[test]
fn test_creates_missing_data_dir() {
    let (_temp_dir, root) = create_test_config_dir();
    let nested = root.join("RotWKTROWModSwitcher");

    ConfigManager::new(&nested).unwrap();
    assert!(nested.is_dir());
}

#[test]
fn test_load_default_user_config() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let user_config = manager.load_file_config().unwrap();

    assert_eq!(user_config, UserConfig::default());
    assert!(user_config.paths.game_path.is_none());
    assert_eq!(user_config.repositories.mod_repo, "SymoniusGit/TROWMod");
    assert_eq!(user_config.network.request_timeout_secs, 15);
    assert!(user_config.update.check_on_startup);
    assert!(!user_config.debug_mode);
}

#[test]
fn test_set_and_get_paths() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    manager
        .set_path(PathKey::GamePath, Some("C:/Games/RotWK".into()))
        .unwrap();
    manager
        .set_path(PathKey::LocalModPath, Some("D:/TROWMod".into()))
        .unwrap();

    let reloaded = ConfigManager::new(&config_path).unwrap();
    let stored = reloaded.load_file_config().unwrap();
    assert_eq!(
        stored.paths.get(PathKey::GamePath),
        Some(&Utf8PathBuf::from("C:/Games/RotWK"))
    );
    assert_eq!(
        stored.paths.get(PathKey::LocalModPath),
        Some(&Utf8PathBuf::from("D:/TROWMod"))
    );

    reloaded.set_path(PathKey::GamePath, None).unwrap();
    let stored = reloaded.load_file_config().unwrap();
    assert!(stored.paths.game_path.is_none());
    assert_eq!(
        stored.paths.local_mod_path,
        Some(Utf8PathBuf::from("D:/TROWMod"))
    );
}

#[test]
fn test_set_path_keeps_other_settings() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let mut config = UserConfig {
        debug_mode: true,
        ..UserConfig::default()
    };
    config.update.handoff_delay_secs = 5;
    manager.save_user_config(&config).unwrap();

    manager
        .set_path(PathKey::GamePath, Some("C:/Games/RotWK".into()))
        .unwrap();

    let stored = manager.load_file_config().unwrap();
    assert!(stored.debug_mode);
    assert_eq!(stored.update.handoff_delay_secs, 5);
}

#[test]
fn test_partial_file_keeps_defaults() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(
        config_path.join(USER_CONFIG_FILENAME),
        "paths:\n  game_path: C:/Games/RotWK\nnetwork:\n  request_timeout_secs: 30\n",
    )
    .unwrap();

    let manager = ConfigManager::new(&config_path).unwrap();
    let config = manager.load_user_config().unwrap();

    assert_eq!(
        config.paths.game_path,
        Some(Utf8PathBuf::from("C:/Games/RotWK"))
    );
    assert_eq!(config.network.request_timeout_secs, 30);
    assert_eq!(config.network.download_timeout_secs, 300);
    assert_eq!(config.network.api_base_url, "https://api.github.com");
    assert!(config.update.check_on_startup);
}

#[test]
fn test_empty_file_is_default() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(config_path.join(USER_CONFIG_FILENAME), "").unwrap();

    let manager = ConfigManager::new(&config_path).unwrap();
    assert_eq!(manager.load_file_config().unwrap(), UserConfig::default());
}

#[test]
fn test_corrupt_file_is_an_error() {
    let (_temp_dir, config_path) = create_test_config_dir();
    fs::write(config_path.join(USER_CONFIG_FILENAME), "paths: [unclosed").unwrap();

    let manager = ConfigManager::new(&config_path).unwrap();
    assert!(manager.load_file_config().is_err());
}

#[test]
fn test_config_feeds_state_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let game_dir = config_path.join("RotWK");
    fs::create_dir_all(&game_dir).unwrap();

    let manager = ConfigManager::new(&config_path).unwrap();
    manager
        .set_path(PathKey::GamePath, Some(game_dir.clone()))
        .unwrap();

    let state_manager = StateManager::new();
    let changes = state_manager.load_from_user_config(&manager.load_file_config().unwrap());

    assert_eq!(changes.len(), 1);
    let state = state_manager.snapshot();
    assert_eq!(state.game_path, Some(game_dir));
    assert!(state.is_game_path_valid());
    assert!(!state.is_local_mod_path_valid());
}
