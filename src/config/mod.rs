use crate::models::{PathKey, UserConfig};
use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Folder name of the switcher's data directory under `%LOCALAPPDATA%`
pub const APP_DATA_DIR_NAME: &str = "RotWKTROWModSwitcher";

/// User configuration file name
pub const USER_CONFIG_FILENAME: &str = "config.yaml";

/// Prefix of environment overrides, e.g. `TROWMOD__NETWORK__REQUEST_TIMEOUT_SECS`
pub const ENV_PREFIX: &str = "TROWMOD";

/// Configuration manager for the switcher's data directory.
///
/// Owns `config.yaml` (paths, network, repositories, update settings). Reads are
/// layered through the `config` crate so environment variables override the file;
/// writes only ever persist what is in the file.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    user_config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified data directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory holding `config.yaml`, logs and update notes
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            user_config_path: config_dir.join(USER_CONFIG_FILENAME),
            config_dir,
        })
    }

    /// `%LOCALAPPDATA%\RotWKTROWModSwitcher` (or the platform equivalent)
    pub fn default_dir() -> Result<Utf8PathBuf> {
        let base = dirs::data_local_dir()
            .ok_or_else(|| anyhow!("Could not determine the local application data directory"))?;
        let base = Utf8PathBuf::from_path_buf(base)
            .map_err(|p| anyhow!("Application data directory is not UTF-8: {}", p.display()))?;
        Ok(base.join(APP_DATA_DIR_NAME))
    }

    /// Load the user configuration with environment overrides applied.
    ///
    /// # Returns
    /// The loaded UserConfig; defaults fill in anything missing
    pub fn load_user_config(&self) -> Result<UserConfig> {
        let settings = config::Config::builder()
            .add_source(
                config::File::from(self.user_config_path.as_std_path())
                    .format(config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read user config: {}", self.user_config_path))?;

        let config: UserConfig = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse user config: {}", self.user_config_path))?;

        tracing::info!("Loaded user config from {}", self.user_config_path);
        Ok(config)
    }

    /// Load only what is stored in the file, without environment overrides.
    pub fn load_file_config(&self) -> Result<UserConfig> {
        if !self.user_config_path.exists() {
            tracing::warn!(
                "User config file not found at {}, using defaults",
                self.user_config_path
            );
            return Ok(UserConfig::default());
        }

        let file_contents = fs::read_to_string(&self.user_config_path)
            .with_context(|| format!("Failed to read user config: {}", self.user_config_path))?;

        // an empty file deserializes to null
        if file_contents.trim().is_empty() {
            return Ok(UserConfig::default());
        }

        let config: UserConfig = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse user config: {}", self.user_config_path))?;
        Ok(config)
    }

    /// Save the user configuration file.
    pub fn save_user_config(&self, config: &UserConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize user config to YAML")?;

        fs::write(&self.user_config_path, yaml_string)
            .with_context(|| format!("Failed to write user config: {}", self.user_config_path))?;

        tracing::info!("Saved user config to {}", self.user_config_path);
        Ok(())
    }

    /// Read one stored path by key.
    pub fn get_path(&self, key: PathKey) -> Result<Option<Utf8PathBuf>> {
        Ok(self.load_user_config()?.paths.get(key).cloned())
    }

    /// Store (or clear, with `None`) one path by key.
    pub fn set_path(&self, key: PathKey, value: Option<Utf8PathBuf>) -> Result<()> {
        let mut config = self.load_file_config()?;
        config.paths.set(key, value);
        self.save_user_config(&config)?;
        tracing::info!("Updated {} in {}", key, self.user_config_path);
        Ok(())
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn user_config_path(&self) -> &Utf8Path {
        &self.user_config_path
    }

    /// Daily rolling log files live here
    pub fn log_dir(&self) -> Utf8PathBuf {
        self.config_dir.join("logs")
    }
}
