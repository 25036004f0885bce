//! Services module - installing, removing and launching the TROW Mod.
//!
//! Everything here works on plain paths and returns report objects; nothing touches
//! presentation state, so the CLI (or any other front end) only renders results.
//!
//! # Components
//!
//! - [`PackageBuilder`]: stages one source subtree and packs it into one `.big` archive,
//!   written atomically. The arts task also swaps in the mod's `asset.dat`
//!   ([`AssetOverride`]).
//! - [`BuildOrchestrator`]: runs every [`BuildTask`] concurrently on the blocking pool and
//!   writes the [`VersionMarker`] only when all of them succeed.
//! - [`ModFileManager`]: deletes the files listed in a manifest derived from the same
//!   task list and restores the original `asset.dat`.
//! - [`ModRetriever`]: downloads the latest tagged mod source from GitHub and builds it.
//! - [`launch_game`]: starts `lotrbfme2ep1.exe`.
//!
//! # Install layout
//!
//! | Task  | Source     | Archive                      |
//! |-------|------------|------------------------------|
//! | INI   | `data/`    | `!TROWMOD_INI.big` (nested)  |
//! | ARTS  | `arts/`    | `!TROWMOD_ARTS.big`          |
//! | LANG  | `lang/`    | `lang/!TROWMOD_ITLANG.big`   |
//! | DATA1 | `scripts/` | `!TROWMOD_DATA1.big`         |

pub mod game;
pub mod marker;
pub mod orchestrator;
pub mod packaging;
pub mod removal;
pub mod retriever;

pub use game::{GAME_EXE_NAME, GameError, is_game_dir, launch_game};
pub use marker::{LOCAL_VERSION, MarkerStatus, VersionMarker};
pub use orchestrator::{BuildError, BuildOrchestrator, BuildReport, BuildResult};
pub use packaging::{
    AssetOverride, BuildTask, DisableOutcome, PackageBuilder, PackageError, RestoreOutcome,
    StagingLayout,
};
pub use removal::{ModFileManager, RemovalError, RemovalReport};
pub use retriever::ModRetriever;
