use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs;
use thiserror::Error;

/// Side file carrying release notes across the restart
pub const UPDATE_INFO_FILENAME: &str = "update_info.json";

#[derive(Error, Debug)]
pub enum NotesError {
    #[error("Failed to access update notes {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Update notes {path} are corrupt: {source}")]
    Corrupt {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Version and notes of an update that is being applied.
///
/// Saved before the handoff, shown once by the new process and then deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateNotes {
    pub version: String,
    #[serde(default)]
    pub notes: String,
}

impl UpdateNotes {
    pub fn new(version: impl Into<String>, notes: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            notes: notes.into(),
        }
    }

    pub fn path(data_dir: &Utf8Path) -> Utf8PathBuf {
        data_dir.join(UPDATE_INFO_FILENAME)
    }

    pub fn save(&self, data_dir: &Utf8Path) -> Result<(), NotesError> {
        let path = Self::path(data_dir);
        let io_err = |source| NotesError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(data_dir).map_err(io_err)?;
        let json = serde_json::to_string_pretty(self).map_err(|source| NotesError::Corrupt {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(io_err)?;

        tracing::info!("Saved notes for version {} to {}", self.version, path);
        Ok(())
    }

    /// Read and delete pending notes. The file is removed even when it is corrupt.
    pub fn take(data_dir: &Utf8Path) -> Result<Option<UpdateNotes>, NotesError> {
        let path = Self::path(data_dir);

        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(NotesError::Io { path, source }),
        };

        Self::discard(data_dir);

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| NotesError::Corrupt { path, source })
    }

    /// Remove the side file if present
    pub fn discard(data_dir: &Utf8Path) {
        super::download::remove_quietly(&Self::path(data_dir));
    }
}
