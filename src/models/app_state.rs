use crate::services::MarkerStatus;
use crate::update::UpdatePhase;
use camino::Utf8PathBuf;
use std::fmt;

/// Long-running operations; at most one runs at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    InstallLocal,
    InstallLatest,
    Remove,
    SelfUpdate,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Operation::InstallLocal => "Installing local mod",
            Operation::InstallLatest => "Installing latest mod release",
            Operation::Remove => "Removing mod",
            Operation::SelfUpdate => "Updating switcher",
        };
        f.write_str(text)
    }
}

/// Single source of truth for runtime state.
///
/// Wrapped in `Arc<RwLock<AppState>>` by [`crate::state::StateManager`]; mutate it only
/// through [`update()`](crate::state::StateManager::update) so change events are emitted.
#[derive(Clone, Debug)]
pub struct AppState {
    // Configured paths
    pub game_path: Option<Utf8PathBuf>,
    pub local_mod_path: Option<Utf8PathBuf>,

    // Installation
    pub installed: MarkerStatus,
    pub latest_mod_version: Option<String>,

    // Runtime
    pub current_operation: Option<Operation>,
    pub last_message: Option<String>,
    pub last_success: Option<bool>,
    pub update_phase: UpdatePhase,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            game_path: None,
            local_mod_path: None,
            installed: MarkerStatus::Missing,
            latest_mod_version: None,
            current_operation: None,
            last_message: None,
            last_success: None,
            update_phase: UpdatePhase::Idle,
        }
    }
}

impl AppState {
    /// The game path is set and points at an existing directory
    pub fn is_game_path_valid(&self) -> bool {
        self.game_path.as_ref().is_some_and(|p| p.is_dir())
    }

    pub fn is_local_mod_path_valid(&self) -> bool {
        self.local_mod_path.as_ref().is_some_and(|p| p.is_dir())
    }

    pub fn is_busy(&self) -> bool {
        self.current_operation.is_some()
    }

    /// A newer mod release than the installed one is known.
    ///
    /// Local builds never count as outdated.
    pub fn is_mod_outdated(&self) -> bool {
        match (&self.installed, &self.latest_mod_version) {
            (MarkerStatus::Installed(installed), Some(latest)) => {
                installed != crate::services::LOCAL_VERSION && installed != latest
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_state() {
        let state = AppState::default();
        assert!(!state.is_game_path_valid());
        assert!(!state.is_busy());
        assert_eq!(state.installed, MarkerStatus::Missing);
        assert_eq!(state.update_phase, UpdatePhase::Idle);
    }

    #[test]
    fn test_game_path_validity() {
        let dir = TempDir::new().unwrap();
        let mut state = AppState {
            game_path: Some(Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()),
            ..AppState::default()
        };
        assert!(state.is_game_path_valid());

        state.game_path = Some(Utf8PathBuf::from("/definitely/not/here"));
        assert!(!state.is_game_path_valid());
    }

    #[test]
    fn test_mod_outdated() {
        let mut state = AppState {
            installed: MarkerStatus::Installed("v1.0".into()),
            latest_mod_version: Some("v1.1".into()),
            ..AppState::default()
        };
        assert!(state.is_mod_outdated());

        state.installed = MarkerStatus::Installed("v1.1".into());
        assert!(!state.is_mod_outdated());

        state.installed = MarkerStatus::Installed("LOCAL".into());
        assert!(!state.is_mod_outdated());

        state.installed = MarkerStatus::Missing;
        assert!(!state.is_mod_outdated());
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::Remove.to_string(), "Removing mod");
    }
}
