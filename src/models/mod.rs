//! Data models for the TROW Mod Switcher.
//!
//! - [`AppState`]: runtime state (configured paths, installed version, running operation)
//! - [`UserConfig`]: user preferences loaded from `config.yaml`
//!
//! # Architecture Note
//!
//! - **Serializable**: config structs derive `Serialize`/`Deserialize` for YAML persistence
//! - **Cloneable**: AppState is wrapped in `Arc<RwLock<>>` by [`StateManager`](crate::state::StateManager)
//! - **Event-driven**: state updates go through StateManager's `update()` method

pub mod app_state;
pub mod config;

pub use app_state::{AppState, Operation};
pub use config::{
    NetworkSettings, PathKey, PathSettings, RepositorySettings, UpdateSettings, UserConfig,
};
