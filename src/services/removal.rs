use super::marker::VERSION_MARKER_FILENAME;
use super::packaging::{AssetOverride, BuildTask, RestoreOutcome};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemovalError {
    #[error("Game installation directory not found: {0}")]
    InvalidInstallDir(Utf8PathBuf),

    #[error("Permission denied removing {path}. Run the switcher as administrator?")]
    PermissionDenied { path: Utf8PathBuf },

    #[error("Failed to remove {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RemovalError {
    fn from_io(path: Utf8PathBuf, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            Self::PermissionDenied { path }
        } else {
            Self::Io { path, source }
        }
    }
}

/// What a removal pass did to every manifest entry
#[derive(Debug)]
pub struct RemovalReport {
    pub removed: Vec<Utf8PathBuf>,
    pub absent: Vec<Utf8PathBuf>,
    pub failures: Vec<RemovalError>,
    pub asset: RestoreOutcome,
}

impl RemovalReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !matches!(self.asset, RestoreOutcome::Failed(_))
    }

    /// At least one file could not be removed for lack of rights
    pub fn needs_elevation(&self) -> bool {
        self.failures
            .iter()
            .any(|f| matches!(f, RemovalError::PermissionDenied { .. }))
    }
}

/// Removes every file a mod installation put into the game directory.
#[derive(Debug, Clone)]
pub struct ModFileManager {
    manifest: Vec<Utf8PathBuf>,
}

impl Default for ModFileManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ModFileManager {
    /// Manifest of the standard build tasks plus the version marker.
    pub fn new() -> Self {
        Self::for_tasks(&BuildTask::standard_set())
    }

    /// Manifest derived from the archives `tasks` produce.
    pub fn for_tasks(tasks: &[BuildTask]) -> Self {
        let mut manifest: Vec<Utf8PathBuf> = tasks.iter().map(|t| t.output.clone()).collect();
        manifest.push(Utf8PathBuf::from(VERSION_MARKER_FILENAME));
        Self { manifest }
    }

    /// Relative paths removed by [`remove_all`](Self::remove_all)
    pub fn manifest(&self) -> &[Utf8PathBuf] {
        &self.manifest
    }

    /// Delete every manifest file and restore the original `asset.dat`.
    ///
    /// Files that are already gone count as removed. Deletions are never rolled back,
    /// even if restoring the asset fails.
    ///
    /// # Returns
    /// The per-file outcome; `Err` only if `install_dir` is not a directory
    pub fn remove_all(&self, install_dir: &Utf8Path) -> Result<RemovalReport, RemovalError> {
        if !install_dir.is_dir() {
            return Err(RemovalError::InvalidInstallDir(install_dir.to_path_buf()));
        }

        tracing::info!("Removing mod files from {}", install_dir);

        let mut removed = Vec::new();
        let mut absent = Vec::new();
        let mut failures = Vec::new();

        for relative in &self.manifest {
            let path = install_dir.join(relative);

            match fs::symlink_metadata(&path) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!("Not present: {}", path);
                    absent.push(path);
                    continue;
                }
                // let remove_file report anything else
                Err(e) => tracing::debug!("Cannot inspect {}: {}", path, e),
                Ok(_) => {}
            }

            match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::info!("Removed {}", path);
                    removed.push(path);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::warn!("{} disappeared before it could be removed", path);
                    absent.push(path);
                }
                Err(source) => {
                    tracing::error!("Failed to remove {}: {}", path, source);
                    failures.push(RemovalError::from_io(path, source));
                }
            }
        }

        let asset = AssetOverride::new(install_dir).restore();
        match &asset {
            RestoreOutcome::Restored => tracing::info!("Original asset.dat restored"),
            RestoreOutcome::NothingToRestore => tracing::debug!("No disabled asset.dat found"),
            RestoreOutcome::Failed(e) => tracing::error!("Could not restore asset.dat: {}", e),
        }

        Ok(RemovalReport {
            removed,
            absent,
            failures,
            asset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::packaging::{ASSET_FILE_NAME, DISABLED_ASSET_FILE_NAME};
    use tempfile::TempDir;

    fn install_dir() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_manifest_matches_task_outputs() {
        let manager = ModFileManager::new();
        let manifest = manager.manifest();

        assert_eq!(manifest.len(), BuildTask::standard_set().len() + 1);
        for task in BuildTask::standard_set() {
            assert!(manifest.contains(&task.output));
        }
        assert!(manifest.contains(&Utf8PathBuf::from(VERSION_MARKER_FILENAME)));
    }

    #[test]
    fn test_remove_on_clean_install_is_success() {
        let (_guard, dir) = install_dir();
        let report = ModFileManager::new().remove_all(&dir).unwrap();

        assert!(report.is_success());
        assert!(report.removed.is_empty());
        assert_eq!(report.absent.len(), 5);
        assert_eq!(report.asset, RestoreOutcome::NothingToRestore);
    }

    #[test]
    fn test_remove_deletes_files_and_restores_asset() {
        let (_guard, dir) = install_dir();
        fs::create_dir_all(dir.join("lang")).unwrap();
        for relative in ModFileManager::new().manifest() {
            fs::write(dir.join(relative), "x").unwrap();
        }
        fs::write(dir.join(ASSET_FILE_NAME), "mod").unwrap();
        fs::write(dir.join(DISABLED_ASSET_FILE_NAME), "original").unwrap();

        let report = ModFileManager::new().remove_all(&dir).unwrap();

        assert!(report.is_success());
        assert_eq!(report.removed.len(), 5);
        assert_eq!(report.asset, RestoreOutcome::Restored);
        assert_eq!(
            fs::read_to_string(dir.join(ASSET_FILE_NAME)).unwrap(),
            "original"
        );
        // the lang folder belongs to the game
        assert!(dir.join("lang").is_dir());
    }

    #[test]
    fn test_invalid_install_dir() {
        let (_guard, dir) = install_dir();
        let result = ModFileManager::new().remove_all(&dir.join("missing"));
        assert!(matches!(result, Err(RemovalError::InvalidInstallDir(_))));
    }

    #[test]
    fn test_permission_error_message_has_hint() {
        let err = RemovalError::PermissionDenied {
            path: "C:/Games/!TROWMOD_INI.big".into(),
        };
        assert!(err.to_string().contains("administrator"));
    }

    #[test]
    fn test_denied_delete_needs_elevation() {
        let path = Utf8PathBuf::from("C:/Games/!TROWMOD_INI.big");
        let report = RemovalReport {
            removed: Vec::new(),
            absent: Vec::new(),
            failures: vec![RemovalError::from_io(
                path.clone(),
                io::Error::from(io::ErrorKind::PermissionDenied),
            )],
            asset: RestoreOutcome::NothingToRestore,
        };

        assert!(matches!(&report.failures[0], RemovalError::PermissionDenied { path: p } if *p == path));
        assert!(!report.is_success());
        assert!(report.needs_elevation());
    }

    #[test]
    fn test_other_io_errors_do_not_ask_for_elevation() {
        let err = RemovalError::from_io(
            "C:/Games/!TROWMOD_INI.big".into(),
            io::Error::other("sharing violation"),
        );
        assert!(matches!(err, RemovalError::Io { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_read_only_folder_reports_denied_file() {
        use std::os::unix::fs::PermissionsExt;

        let (_guard, dir) = install_dir();
        let lang = dir.join("lang");
        fs::create_dir_all(&lang).unwrap();
        fs::write(lang.join("!TROWMOD_ITLANG.big"), "x").unwrap();
        fs::set_permissions(&lang, fs::Permissions::from_mode(0o555)).unwrap();

        // privileged users can write anyway, nothing to check then
        if fs::write(lang.join("write_check"), "x").is_ok() {
            fs::set_permissions(&lang, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let manager = ModFileManager {
            manifest: vec![Utf8PathBuf::from("lang/!TROWMOD_ITLANG.big")],
        };
        let report = manager.remove_all(&dir).unwrap();
        fs::set_permissions(&lang, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(!report.is_success());
        assert!(report.needs_elevation());
        assert!(report.removed.is_empty());
        assert!(lang.join("!TROWMOD_ITLANG.big").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_entry_is_not_counted_absent() {
        let (_guard, dir) = install_dir();
        fs::write(dir.join("lang"), "a file where a folder belongs").unwrap();

        let manager = ModFileManager {
            manifest: vec![Utf8PathBuf::from("lang/!TROWMOD_ITLANG.big")],
        };
        let report = manager.remove_all(&dir).unwrap();

        assert!(report.absent.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0], RemovalError::Io { .. }));
        assert!(!report.is_success());
    }
}
