// Packaging of one mod subtree into one game archive.
//
// A build never reads the live source tree while packing: the subtree is first copied
// into a private staging directory, packed from there, and the archive is moved into
// the installation directory with a rename so a half-written file is never visible.

use crate::archive::{ArchiveError, BigArchive};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;
use thiserror::Error;
use walkdir::WalkDir;

/// Name of the override asset the game reads from its installation root
pub const ASSET_FILE_NAME: &str = "asset.dat";

/// Name the original asset is parked under while the mod is installed
pub const DISABLED_ASSET_FILE_NAME: &str = "asset.dat.disabled";

/// Errors raised while building a single archive
#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Source subtree not found: {0}")]
    MissingSource(Utf8PathBuf),

    #[error("Failed to disable {path}: {source}")]
    DisableAsset {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to install asset override {path}: {source}")]
    InstallAsset {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to stage {from} into {to}: {source}")]
    Staging {
        from: Utf8PathBuf,
        to: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to package {archive}: {source}")]
    Archive {
        archive: Utf8PathBuf,
        #[source]
        source: ArchiveError,
    },

    #[error("Failed to move archive into place at {path}: {source}")]
    Commit {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Build task panicked: {0}")]
    Panicked(String),
}

impl PackageError {
    /// Whether the failure is an access-denied error on the installation directory
    pub fn is_permission_denied(&self) -> bool {
        let kind = match self {
            PackageError::DisableAsset { source, .. }
            | PackageError::InstallAsset { source, .. }
            | PackageError::Staging { source, .. }
            | PackageError::Commit { source, .. } => source.kind(),
            PackageError::Archive {
                source: ArchiveError::Io(source),
                ..
            } => source.kind(),
            _ => return false,
        };
        kind == io::ErrorKind::PermissionDenied
    }
}

/// How a subtree is laid out inside its archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingLayout {
    /// Subtree contents become the archive root
    Flatten,
    /// Subtree is kept as a top-level folder named after it
    Nested,
}

/// One unit of parallel work: a source subtree and the archive it becomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTask {
    pub name: String,

    /// Subtree of the source tree, relative to its root
    pub source_subpath: Utf8PathBuf,

    /// Archive path, relative to the installation directory
    pub output: Utf8PathBuf,

    pub layout: StagingLayout,

    /// Disable the installed `asset.dat` and install the subtree's copy before packing
    pub installs_asset_override: bool,
}

impl BuildTask {
    pub fn new(
        name: impl Into<String>,
        source_subpath: impl Into<Utf8PathBuf>,
        output: impl Into<Utf8PathBuf>,
        layout: StagingLayout,
    ) -> Self {
        Self {
            name: name.into(),
            source_subpath: source_subpath.into(),
            output: output.into(),
            layout,
            installs_asset_override: false,
        }
    }

    pub fn with_asset_override(mut self) -> Self {
        self.installs_asset_override = true;
        self
    }

    /// The four archives that make up a TROW Mod installation.
    pub fn standard_set() -> Vec<BuildTask> {
        vec![
            BuildTask::new("INI", "data", "!TROWMOD_INI.big", StagingLayout::Nested),
            BuildTask::new("ARTS", "arts", "!TROWMOD_ARTS.big", StagingLayout::Flatten)
                .with_asset_override(),
            BuildTask::new(
                "LANG",
                "lang",
                "lang/!TROWMOD_ITLANG.big",
                StagingLayout::Flatten,
            ),
            BuildTask::new(
                "DATA1",
                "scripts",
                "!TROWMOD_DATA1.big",
                StagingLayout::Flatten,
            ),
        ]
    }
}

/// What happened to the installed `asset.dat` when it was disabled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisableOutcome {
    /// `asset.dat` was renamed to `asset.dat.disabled`
    Disabled,
    /// A disabled original already exists; the current file is a previous mod copy
    AlreadyDisabled,
    /// Nothing to disable
    NotFound,
}

/// Result of putting the original `asset.dat` back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored,
    NothingToRestore,
    Failed(String),
}

/// The `asset.dat` / `asset.dat.disabled` pair in an installation directory.
///
/// At most one of the two files is the original: disabling parks it under the
/// `.disabled` name, restoring moves it back.
#[derive(Debug, Clone)]
pub struct AssetOverride {
    install_dir: Utf8PathBuf,
}

impl AssetOverride {
    pub fn new(install_dir: &Utf8Path) -> Self {
        Self {
            install_dir: install_dir.to_path_buf(),
        }
    }

    pub fn active_path(&self) -> Utf8PathBuf {
        self.install_dir.join(ASSET_FILE_NAME)
    }

    pub fn disabled_path(&self) -> Utf8PathBuf {
        self.install_dir.join(DISABLED_ASSET_FILE_NAME)
    }

    /// Step 1: park the installed asset under its disabled name
    pub fn disable_current(&self) -> Result<DisableOutcome, PackageError> {
        let active = self.active_path();
        let disabled = self.disabled_path();

        if disabled.exists() {
            tracing::info!(
                "Original asset already preserved at {}, leaving it untouched",
                disabled
            );
            return Ok(DisableOutcome::AlreadyDisabled);
        }

        match fs::rename(&active, &disabled) {
            Ok(()) => {
                tracing::info!("Disabled {} -> {}", active, disabled);
                Ok(DisableOutcome::Disabled)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!("No {} to disable", active);
                Ok(DisableOutcome::NotFound)
            }
            Err(source) => Err(PackageError::DisableAsset {
                path: active,
                source,
            }),
        }
    }

    /// Step 2: copy the mod's asset over the active name
    pub fn install(&self, replacement: &Utf8Path) -> Result<(), PackageError> {
        let active = self.active_path();
        fs::copy(replacement, &active).map_err(|source| PackageError::InstallAsset {
            path: active.clone(),
            source,
        })?;
        tracing::info!("Installed asset override {} -> {}", replacement, active);
        Ok(())
    }

    /// Move a parked original back, replacing whatever mod copy is active.
    pub fn restore(&self) -> RestoreOutcome {
        let active = self.active_path();
        let disabled = self.disabled_path();

        if !disabled.exists() {
            return RestoreOutcome::NothingToRestore;
        }

        // rename does not replace an existing file on every platform
        if let Err(e) = fs::remove_file(&active) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::error!("Failed to remove mod asset {}: {}", active, e);
                return RestoreOutcome::Failed(format!("{}: {}", active, e));
            }
        }

        match fs::rename(&disabled, &active) {
            Ok(()) => {
                tracing::info!("Restored {} -> {}", disabled, active);
                RestoreOutcome::Restored
            }
            Err(e) => {
                tracing::error!("Failed to restore {}: {}", disabled, e);
                RestoreOutcome::Failed(format!("{}: {}", disabled, e))
            }
        }
    }
}

/// Successful output of one build task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOutput {
    pub archive_path: Utf8PathBuf,
    pub entries: usize,
    pub bytes: u64,
    pub asset: Option<DisableOutcome>,
}

/// Builds one archive from one source subtree.
#[derive(Debug, Clone, Default)]
pub struct PackageBuilder;

impl PackageBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Run a build task.
    ///
    /// # Arguments
    /// * `task` - What to pack and where the archive goes
    /// * `source_root` - Root of the mod source tree
    /// * `install_dir` - Game installation directory
    ///
    /// # Returns
    /// The written archive, or the first failing step
    pub fn build(
        &self,
        task: &BuildTask,
        source_root: &Utf8Path,
        install_dir: &Utf8Path,
    ) -> Result<PackageOutput, PackageError> {
        let source = source_root.join(&task.source_subpath);
        if !source.is_dir() {
            return Err(PackageError::MissingSource(source));
        }

        let asset = if task.installs_asset_override {
            Some(self.apply_asset_override(&source, install_dir)?)
        } else {
            None
        };

        let output = install_dir.join(&task.output);
        tracing::info!("[{}] Creating {} from {}", task.name, output, source);

        let staging = tempfile::Builder::new()
            .prefix(&format!("trowmod_{}_", task.name.to_lowercase()))
            .tempdir()
            .map_err(|e| PackageError::Staging {
                from: source.clone(),
                to: Utf8PathBuf::from(std::env::temp_dir().to_string_lossy().into_owned()),
                source: e,
            })?;
        let staging_root = utf8_path(staging.path()).map_err(|e| PackageError::Staging {
            from: source.clone(),
            to: Utf8PathBuf::new(),
            source: e,
        })?;

        let target = match task.layout {
            StagingLayout::Flatten => staging_root.clone(),
            StagingLayout::Nested => match task.source_subpath.file_name() {
                Some(folder) => staging_root.join(folder),
                None => staging_root.clone(),
            },
        };

        let copied = copy_tree(&source, &target).map_err(|e| PackageError::Staging {
            from: source.clone(),
            to: target.clone(),
            source: e,
        })?;
        tracing::debug!("[{}] Staged {} files in {}", task.name, copied, target);

        let archive =
            BigArchive::from_directory(&staging_root).map_err(|e| PackageError::Archive {
                archive: output.clone(),
                source: e,
            })?;

        write_atomically(&archive, &output)?;

        tracing::info!(
            "[{}] Wrote {} ({} entries, {} bytes)",
            task.name,
            output,
            archive.entries().len(),
            archive.archive_size()
        );

        Ok(PackageOutput {
            archive_path: output,
            entries: archive.entries().len(),
            bytes: archive.archive_size(),
            asset,
        })
    }

    /// Steps 1 and 2 of the arts build. The source asset is checked first so a
    /// missing file cannot leave the installation without any `asset.dat`.
    fn apply_asset_override(
        &self,
        source: &Utf8Path,
        install_dir: &Utf8Path,
    ) -> Result<DisableOutcome, PackageError> {
        let replacement = source.join(ASSET_FILE_NAME);
        if !replacement.is_file() {
            return Err(PackageError::MissingSource(replacement));
        }

        let pair = AssetOverride::new(install_dir);
        let outcome = pair.disable_current()?;
        pair.install(&replacement)?;
        Ok(outcome)
    }
}

/// Save under a temporary name next to the target, then rename over it.
fn write_atomically(archive: &BigArchive, output: &Utf8Path) -> Result<(), PackageError> {
    let commit_err = |source: io::Error| PackageError::Commit {
        path: output.to_path_buf(),
        source,
    };

    let parent = output.parent().unwrap_or(Utf8Path::new("."));
    fs::create_dir_all(parent).map_err(commit_err)?;

    let temp = tempfile::Builder::new()
        .prefix(".trowmod_")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(commit_err)?
        .into_temp_path();
    let temp_path = utf8_path(&temp).map_err(commit_err)?;

    archive
        .save(&temp_path)
        .map_err(|source| PackageError::Archive {
            archive: output.to_path_buf(),
            source,
        })?;

    temp.persist(output).map_err(|e| commit_err(e.error))?;
    Ok(())
}

/// Recursively copy `from` into `to`, returning the number of files copied.
pub fn copy_tree(from: &Utf8Path, to: &Utf8Path) -> io::Result<usize> {
    fs::create_dir_all(to)?;
    let mut files = 0;

    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| io::Error::other(e.to_string()))?;
        let destination = to.as_std_path().join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &destination)?;
            files += 1;
        }
    }

    Ok(files)
}

fn utf8_path(path: &std::path::Path) -> io::Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).map_err(|p| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("path is not valid UTF-8: {}", p.display()),
        )
    })
}
