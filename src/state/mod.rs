// State management module
//
// This module provides the StateManager which wraps AppState with thread-safe access
// using Arc<RwLock<T>> and emits change events for the presentation layer.

use crate::models::{AppState, Operation, UserConfig};
use crate::services::MarkerStatus;
use crate::update::UpdatePhase;
use camino::Utf8PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Change events emitted when state is modified
#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    /// Game or mod source path changed
    PathsChanged { game_path_valid: bool },

    /// A long-running operation has started
    OperationStarted { operation: Operation },

    /// A long-running operation has finished
    OperationFinished {
        operation: Operation,
        success: bool,
        message: String,
    },

    /// The installed version marker was (re)read
    InstalledVersionChanged { status: MarkerStatus },

    /// The latest published mod version changed
    LatestModVersionChanged { version: Option<String> },

    /// The self-update coordinator moved to a new phase
    UpdatePhaseChanged { phase: UpdatePhase },
}

/// Thread-safe state manager with event emission
///
/// - Provides thread-safe access to [`AppState`] via `Arc<RwLock<T>>`
/// - Detects state changes and emits [`StateChange`] events
/// - Refuses to start an operation while another one runs
///
/// # Usage
///
/// - [`read()`](Self::read) for reading state
/// - [`update()`](Self::update) for mutations with automatic event emission
/// - [`subscribe()`](Self::subscribe) for listening to state changes
pub struct StateManager {
    state: Arc<RwLock<AppState>>,

    /// Multiple subscribers can listen for state changes
    state_tx: broadcast::Sender<StateChange>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    /// Create a new StateManager with default state and a 100-event buffer
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(AppState::default())),
            state_tx,
        }
    }

    /// Clone of the current state
    pub fn snapshot(&self) -> AppState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Execute a function with read access to the state
    ///
    /// # Example
    /// ```ignore
    /// let busy = state_manager.read(|state| state.is_busy());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&AppState) -> R,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    /// Update the state and emit change events
    ///
    /// # Arguments
    /// * `update_fn` - A function that mutates the state
    ///
    /// # Returns
    /// The StateChange events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut AppState),
    {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let old_state = state.clone();

        update_fn(&mut state);

        let changes = Self::detect_changes(&old_state, &state);
        for change in &changes {
            // no subscribers is fine
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    /// Subscribe to state change events
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn detect_changes(old: &AppState, new: &AppState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.game_path != new.game_path || old.local_mod_path != new.local_mod_path {
            changes.push(StateChange::PathsChanged {
                game_path_valid: new.is_game_path_valid(),
            });
        }

        match (old.current_operation, new.current_operation) {
            (None, Some(operation)) => changes.push(StateChange::OperationStarted { operation }),
            (Some(operation), None) => changes.push(StateChange::OperationFinished {
                operation,
                success: new.last_success.unwrap_or(true),
                message: new.last_message.clone().unwrap_or_default(),
            }),
            _ => {}
        }

        if old.installed != new.installed {
            changes.push(StateChange::InstalledVersionChanged {
                status: new.installed.clone(),
            });
        }

        if old.latest_mod_version != new.latest_mod_version {
            changes.push(StateChange::LatestModVersionChanged {
                version: new.latest_mod_version.clone(),
            });
        }

        if old.update_phase != new.update_phase {
            changes.push(StateChange::UpdatePhaseChanged {
                phase: new.update_phase,
            });
        }

        changes
    }

    // Convenience methods for common state updates

    pub fn set_game_path(&self, path: Option<Utf8PathBuf>) -> Vec<StateChange> {
        self.update(|state| state.game_path = path)
    }

    pub fn set_local_mod_path(&self, path: Option<Utf8PathBuf>) -> Vec<StateChange> {
        self.update(|state| state.local_mod_path = path)
    }

    pub fn set_installed(&self, status: MarkerStatus) -> Vec<StateChange> {
        self.update(|state| state.installed = status)
    }

    pub fn set_latest_mod_version(&self, version: Option<String>) -> Vec<StateChange> {
        self.update(|state| state.latest_mod_version = version)
    }

    pub fn set_update_phase(&self, phase: UpdatePhase) -> Vec<StateChange> {
        self.update(|state| state.update_phase = phase)
    }

    /// Mark `operation` as running.
    ///
    /// # Returns
    /// `false` without changing anything if another operation is already running
    pub fn begin_operation(&self, operation: Operation) -> bool {
        let mut started = false;
        self.update(|state| {
            if state.current_operation.is_none() {
                state.current_operation = Some(operation);
                state.last_message = None;
                state.last_success = None;
                started = true;
            }
        });
        if !started {
            tracing::warn!("Refusing to start '{}' while another operation runs", operation);
        }
        started
    }

    /// Clear the running operation and record its outcome
    pub fn finish_operation(&self, success: bool, message: impl Into<String>) -> Vec<StateChange> {
        let message = message.into();
        self.update(|state| {
            state.current_operation = None;
            state.last_message = Some(message);
            state.last_success = Some(success);
        })
    }

    /// Load configured paths from UserConfig
    pub fn load_from_user_config(&self, user_config: &UserConfig) -> Vec<StateChange> {
        self.update(|state| {
            state.game_path = user_config.paths.game_path.clone();
            state.local_mod_path = user_config.paths.local_mod_path.clone();

            tracing::info!(
                "Loaded user config: game_path={}, local_mod_path={}",
                state.is_game_path_valid(),
                state.is_local_mod_path_valid()
            );
        })
    }

    /// Shared handle for worker threads
    pub fn state_arc(&self) -> Arc<RwLock<AppState>> {
        Arc::clone(&self.state)
    }
}
