use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use thiserror::Error;

/// File recording the installed mod version, inside the installation directory
pub const VERSION_MARKER_FILENAME: &str = "trowmod_version.json";

/// Version written for builds from a local source tree
pub const LOCAL_VERSION: &str = "LOCAL";

#[derive(Error, Debug)]
pub enum MarkerError {
    #[error("Failed to serialize version marker: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write version marker {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Persisted record of which mod version is installed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMarker {
    pub version: String,
}

/// What the marker file says about an installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerStatus {
    Installed(String),
    Missing,
    /// Present but unreadable; the installed version is unknown
    Corrupt(String),
}

impl MarkerStatus {
    pub fn version(&self) -> Option<&str> {
        match self {
            MarkerStatus::Installed(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for MarkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerStatus::Installed(v) => write!(f, "{}", v),
            MarkerStatus::Missing => f.write_str("not installed"),
            MarkerStatus::Corrupt(_) => f.write_str("unknown (corrupt marker)"),
        }
    }
}

impl VersionMarker {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    pub fn path(install_dir: &Utf8Path) -> Utf8PathBuf {
        install_dir.join(VERSION_MARKER_FILENAME)
    }

    /// Write the marker, replacing any previous one in a single rename.
    pub fn write(&self, install_dir: &Utf8Path) -> Result<(), MarkerError> {
        let path = Self::path(install_dir);
        let json = serde_json::to_string_pretty(self)?;
        let write_err = |source: std::io::Error| MarkerError::Write {
            path: path.clone(),
            source,
        };

        let mut temp = tempfile::Builder::new()
            .prefix(".trowmod_version_")
            .suffix(".tmp")
            .tempfile_in(install_dir)
            .map_err(write_err)?;
        temp.write_all(json.as_bytes()).map_err(write_err)?;
        temp.as_file().sync_all().map_err(write_err)?;
        temp.persist(&path).map_err(|e| write_err(e.error))?;

        tracing::info!("Wrote version marker {} ({})", path, self.version);
        Ok(())
    }

    /// Read the marker of an installation.
    pub fn read(install_dir: &Utf8Path) -> MarkerStatus {
        let path = Self::path(install_dir);

        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return MarkerStatus::Missing,
            Err(e) => {
                tracing::warn!("Failed to read version marker {}: {}", path, e);
                return MarkerStatus::Corrupt(e.to_string());
            }
        };

        match serde_json::from_str::<VersionMarker>(&contents) {
            Ok(marker) if !marker.version.trim().is_empty() => {
                MarkerStatus::Installed(marker.version)
            }
            Ok(_) => MarkerStatus::Corrupt("empty version".to_string()),
            Err(e) => {
                tracing::warn!("Version marker {} is corrupt: {}", path, e);
                MarkerStatus::Corrupt(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn install_dir() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_missing_marker() {
        let (_guard, dir) = install_dir();
        assert_eq!(VersionMarker::read(&dir), MarkerStatus::Missing);
    }

    #[test]
    fn test_write_then_overwrite() {
        let (_guard, dir) = install_dir();
        VersionMarker::new("v2.1").write(&dir).unwrap();
        VersionMarker::new(LOCAL_VERSION).write(&dir).unwrap();

        assert_eq!(
            VersionMarker::read(&dir),
            MarkerStatus::Installed("LOCAL".to_string())
        );
        let raw = fs::read_to_string(VersionMarker::path(&dir)).unwrap();
        assert!(raw.contains("\"version\""));
    }

    #[test]
    fn test_corrupt_marker() {
        let (_guard, dir) = install_dir();
        fs::write(VersionMarker::path(&dir), "{not json").unwrap();
        assert!(matches!(VersionMarker::read(&dir), MarkerStatus::Corrupt(_)));

        fs::write(VersionMarker::path(&dir), r#"{"version": ""}"#).unwrap();
        assert!(matches!(VersionMarker::read(&dir), MarkerStatus::Corrupt(_)));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(MarkerStatus::Installed("v1".into()).to_string(), "v1");
        assert_eq!(MarkerStatus::Missing.to_string(), "not installed");
        assert_eq!(MarkerStatus::Missing.version(), None);
    }
}
