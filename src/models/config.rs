use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// User configuration from `config.yaml` in the switcher's data directory.
///
/// Every section has defaults so a partial (or missing) file is always usable, and
/// the `config` crate can layer environment overrides on top.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub paths: PathSettings,
    pub network: NetworkSettings,
    pub repositories: RepositorySettings,
    pub update: UpdateSettings,
    pub debug_mode: bool,
}

/// Paths chosen by the user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// RotWK installation directory (where `lotrbfme2ep1.exe` lives)
    pub game_path: Option<Utf8PathBuf>,

    /// Local checkout of the mod sources, used for local installs
    pub local_mod_path: Option<Utf8PathBuf>,
}

/// HTTP settings shared by release checks and downloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Timeout for API calls and for connecting before a download
    pub request_timeout_secs: u64,

    /// Upper bound for a whole download
    pub download_timeout_secs: u64,

    pub user_agent: String,

    /// GitHub REST API root
    pub api_base_url: String,

    /// GitHub web root, used for tag source archives
    pub github_base_url: String,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            download_timeout_secs: default_download_timeout(),
            user_agent: format!("{}-Updater-Client/{}", crate::APP_NAME, crate::VERSION),
            api_base_url: "https://api.github.com".to_string(),
            github_base_url: "https://github.com".to_string(),
        }
    }
}

impl NetworkSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

/// GitHub repositories the switcher talks to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositorySettings {
    /// Mod content repository (`owner/name`)
    pub mod_repo: String,

    /// The switcher's own repository (`owner/name`)
    pub switcher_repo: String,

    /// Release asset name of the switcher executable
    pub switcher_asset: String,
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            mod_repo: "SymoniusGit/TROWMod".to_string(),
            switcher_repo: "giuseppelagualano/rotwk-trowmod-switcher".to_string(),
            switcher_asset: "rotwk-trowmod-switcher.exe".to_string(),
        }
    }
}

/// Self-update behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateSettings {
    /// Run a silent update check every time the switcher starts
    pub check_on_startup: bool,

    /// Seconds the handoff script waits for this process to exit
    pub handoff_delay_secs: u64,
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self {
            check_on_startup: true,
            handoff_delay_secs: default_handoff_delay(),
        }
    }
}

impl UpdateSettings {
    pub fn handoff_delay(&self) -> Duration {
        Duration::from_secs(self.handoff_delay_secs)
    }
}

fn default_request_timeout() -> u64 {
    15
}

fn default_download_timeout() -> u64 {
    300
}

fn default_handoff_delay() -> u64 {
    3
}

/// Keys of the paths store, addressable by name from the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKey {
    GamePath,
    LocalModPath,
}

impl PathKey {
    pub const ALL: [PathKey; 2] = [PathKey::GamePath, PathKey::LocalModPath];

    pub fn as_str(&self) -> &'static str {
        match self {
            PathKey::GamePath => "game_path",
            PathKey::LocalModPath => "local_mod_path",
        }
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PathKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PathKey::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown path key '{}', expected one of: {}",
                    s,
                    PathKey::ALL.map(|k| k.as_str()).join(", ")
                )
            })
    }
}

impl PathSettings {
    pub fn get(&self, key: PathKey) -> Option<&Utf8PathBuf> {
        match key {
            PathKey::GamePath => self.game_path.as_ref(),
            PathKey::LocalModPath => self.local_mod_path.as_ref(),
        }
    }

    pub fn set(&mut self, key: PathKey, value: Option<Utf8PathBuf>) {
        match key {
            PathKey::GamePath => self.game_path = value,
            PathKey::LocalModPath => self.local_mod_path = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_defaults() {
        let settings = NetworkSettings::default();
        assert_eq!(settings.request_timeout(), Duration::from_secs(15));
        assert_eq!(settings.download_timeout(), Duration::from_secs(300));
        assert_eq!(settings.api_base_url, "https://api.github.com");
        assert!(
            settings
                .user_agent
                .starts_with("rotwk-trowmod-switcher-Updater-Client/")
        );
    }

    #[test]
    fn test_user_config_default() {
        let config = UserConfig::default();
        assert!(config.paths.game_path.is_none());
        assert!(config.update.check_on_startup);
        assert_eq!(config.update.handoff_delay_secs, 3);
        assert_eq!(config.repositories.mod_repo, "SymoniusGit/TROWMod");
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "paths:\n  game_path: C:/Games/RotWK\nnetwork:\n  request_timeout_secs: 5\n";
        let config: UserConfig = serde_yaml_ng::from_str(yaml).unwrap();

        assert_eq!(
            config.paths.game_path,
            Some(Utf8PathBuf::from("C:/Games/RotWK"))
        );
        assert_eq!(config.network.request_timeout_secs, 5);
        assert_eq!(config.network.download_timeout_secs, 300);
        assert_eq!(config.repositories, RepositorySettings::default());
    }

    #[test]
    fn test_path_key_parsing() {
        assert_eq!("game_path".parse::<PathKey>().unwrap(), PathKey::GamePath);
        assert_eq!(
            " LOCAL_MOD_PATH ".parse::<PathKey>().unwrap(),
            PathKey::LocalModPath
        );
        assert!("install_dir".parse::<PathKey>().is_err());
    }

    #[test]
    fn test_path_settings_yaml_round_trip() {
        let paths = PathSettings {
            game_path: Some(Utf8PathBuf::from("C:/Games/RotWK")),
            local_mod_path: None,
        };

        let yaml = serde_yaml_ng::to_string(&paths).unwrap();
        assert!(yaml.contains("game_path: C:/Games/RotWK"));
        let parsed: PathSettings = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(parsed, paths);
    }

    #[test]
    fn test_path_settings_get_set() {
        let mut paths = PathSettings::default();
        paths.set(PathKey::LocalModPath, Some("D:/TROWMod".into()));

        assert_eq!(
            paths.get(PathKey::LocalModPath),
            Some(&Utf8PathBuf::from("D:/TROWMod"))
        );
        assert!(paths.get(PathKey::GamePath).is_none());
    }
}
