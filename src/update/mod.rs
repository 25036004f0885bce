//! Self-update of the switcher executable.
//!
//! - [`releases`]: latest-release lookup on GitHub and semantic version comparison
//! - [`download`]: streaming download of the new executable with verification
//! - [`handoff`]: the detached script that replaces the running binary
//! - [`notes`]: release notes carried across the restart
//! - [`coordinator`]: the state machine tying the steps together
//!
//! The only intentional process exit in the application happens after
//! [`UpdateOutcome::HandoffLaunched`].

pub mod coordinator;
pub mod download;
pub mod handoff;
pub mod notes;
pub mod releases;

pub use coordinator::{
    CheckMode, SelfUpdateCoordinator, UpdateError, UpdateOutcome, UpdatePhase, UpdateTarget,
};
pub use download::{DownloadError, UpdateDownloader, UpdatePackage};
pub use handoff::{BatchHandoffLauncher, HandoffError, HandoffLauncher, HandoffSpec};
pub use notes::{NotesError, UpdateNotes};
pub use releases::{
    ReleaseAsset, ReleaseChecker, ReleaseError, RemoteRelease, UpdateCheck, UpdateOffer,
    parse_version,
};
