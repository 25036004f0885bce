//! Archive containers consumed by the game.
//!
//! The Rise of the Witch-king loads its content from EA `.big` archives. Everything the
//! switcher deploys ends up in one of these files, so the rest of the crate only needs
//! two operations from this module:
//!
//! - [`BigArchive::from_directory`]: index a directory tree
//! - [`BigArchive::save`]: write the indexed tree as a single archive
//!
//! [`BigReader`] is the inverse. It reads an archive back so packed output can be
//! verified entry by entry.

pub mod big;

pub use big::{BigArchive, BigEntry, BigReader};

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur while packing or reading an archive
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Source directory not found: {0}")]
    SourceNotFound(Utf8PathBuf),

    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8Path(String),

    #[error("Archive exceeds the 4 GiB BIG limit ({0} bytes)")]
    TooLarge(u64),

    #[error("Malformed archive: {0}")]
    Malformed(String),

    #[error("Entry not found in archive: {0}")]
    EntryNotFound(String),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
