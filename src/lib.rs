// TROW Mod Switcher - deploys the TROW Mod into The Rise of the Witch-king
//
// This is the library crate containing the core logic and data structures.
// The binary crate (main.rs) provides the command line front end.

pub mod archive;
pub mod config;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;
pub mod update;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use models::{AppState, Operation, PathKey, UserConfig};
pub use services::{BuildOrchestrator, BuildReport, MarkerStatus, ModFileManager, RemovalReport};
pub use state::{StateChange, StateManager};
pub use update::{CheckMode, SelfUpdateCoordinator, UpdateOutcome, UpdatePhase};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "rotwk-trowmod-switcher";
