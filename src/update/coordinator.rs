// Self-update state machine: check, confirm, download, hand off.

use super::download::{DownloadError, UpdateDownloader, UpdatePackage, remove_quietly};
use super::handoff::{HandoffError, HandoffLauncher, HandoffSpec};
use super::notes::{NotesError, UpdateNotes};
use super::releases::{ReleaseChecker, ReleaseError, UpdateCheck, UpdateOffer};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Could not check for updates: {0}")]
    Check(#[from] ReleaseError),

    #[error("Version {version} is available but has no '{asset}' download, update manually")]
    AssetMissing { version: String, asset: String },

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Notes(#[from] NotesError),

    #[error(transparent)]
    Handoff(#[from] HandoffError),
}

/// Where the coordinator is in the update flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    Idle,
    Checking,
    UpdateFound,
    AwaitingConfirmation,
    Downloading,
    Downloaded,
    HandoffLaunched,
    Failed,
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UpdatePhase::Idle => "idle",
            UpdatePhase::Checking => "checking for updates",
            UpdatePhase::UpdateFound => "update found",
            UpdatePhase::AwaitingConfirmation => "waiting for confirmation",
            UpdatePhase::Downloading => "downloading",
            UpdatePhase::Downloaded => "downloaded",
            UpdatePhase::HandoffLaunched => "restarting",
            UpdatePhase::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// Silent checks swallow failures; explicit ones report them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    Silent,
    Explicit,
}

#[derive(Debug)]
#[must_use = "the process must exit after HandoffLaunched"]
pub enum UpdateOutcome {
    UpToDate { latest: String },
    /// Silent check that could not reach a conclusion
    NoInformation,
    Declined { version: String },
    Failed(UpdateError),
    /// The helper script is running; exit now
    HandoffLaunched { version: String },
}

/// The binary being updated and where its releases live
#[derive(Debug, Clone)]
pub struct UpdateTarget {
    pub repo: String,
    pub asset_name: String,
    pub current_version: String,
    pub current_exe: Utf8PathBuf,
}

/// Drives one update attempt through [`UpdatePhase`]s.
///
/// The phase is published on a `watch` channel so a presentation layer can follow
/// along without sharing state with the coordinator.
pub struct SelfUpdateCoordinator {
    checker: ReleaseChecker,
    downloader: UpdateDownloader,
    launcher: Box<dyn HandoffLauncher>,
    target: UpdateTarget,
    data_dir: Utf8PathBuf,
    script_dir: Utf8PathBuf,
    handoff_delay: Duration,
    phase_tx: watch::Sender<UpdatePhase>,
}

impl SelfUpdateCoordinator {
    /// # Arguments
    /// * `data_dir` - Directory receiving the update notes side file
    pub fn new(
        checker: ReleaseChecker,
        downloader: UpdateDownloader,
        launcher: Box<dyn HandoffLauncher>,
        target: UpdateTarget,
        data_dir: impl Into<Utf8PathBuf>,
    ) -> Self {
        let (phase_tx, _) = watch::channel(UpdatePhase::Idle);
        let script_dir = downloader
            .target_path()
            .parent()
            .map(Utf8Path::to_path_buf)
            .unwrap_or_default();

        Self {
            checker,
            downloader,
            launcher,
            target,
            data_dir: data_dir.into(),
            script_dir,
            handoff_delay: Duration::from_secs(3),
            phase_tx,
        }
    }

    pub fn with_handoff_delay(mut self, delay: Duration) -> Self {
        self.handoff_delay = delay;
        self
    }

    pub fn phase(&self) -> UpdatePhase {
        *self.phase_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<UpdatePhase> {
        self.phase_tx.subscribe()
    }

    fn set_phase(&self, phase: UpdatePhase) {
        tracing::debug!("Update phase: {}", phase);
        self.phase_tx.send_replace(phase);
    }

    /// Run one update attempt.
    ///
    /// `confirm` is called while the phase is `AwaitingConfirmation` and blocks until
    /// the user decides. A new attempt always starts from `Idle`.
    pub async fn run<F>(&self, mode: CheckMode, confirm: F) -> UpdateOutcome
    where
        F: FnOnce(&UpdateOffer) -> bool,
    {
        self.set_phase(UpdatePhase::Idle);
        self.set_phase(UpdatePhase::Checking);

        let check = self
            .checker
            .check_for_update(
                &self.target.repo,
                &self.target.current_version,
                &self.target.asset_name,
            )
            .await;

        let offer = match check {
            Ok(UpdateCheck::Available(offer)) => offer,
            Ok(UpdateCheck::UpToDate { latest }) => {
                tracing::info!(
                    "Running {} is up to date (latest {})",
                    self.target.current_version,
                    latest
                );
                self.set_phase(UpdatePhase::Idle);
                return UpdateOutcome::UpToDate { latest };
            }
            Ok(UpdateCheck::AssetMissing { version, asset }) => {
                return self.check_failed(mode, UpdateError::AssetMissing { version, asset });
            }
            Err(e) => return self.check_failed(mode, e.into()),
        };

        self.set_phase(UpdatePhase::UpdateFound);
        self.set_phase(UpdatePhase::AwaitingConfirmation);

        if !confirm(&offer) {
            tracing::info!("Update to {} declined", offer.version);
            self.set_phase(UpdatePhase::Idle);
            return UpdateOutcome::Declined {
                version: offer.version,
            };
        }

        self.set_phase(UpdatePhase::Downloading);
        let package = match self.downloader.download(&offer).await {
            Ok(package) => package,
            Err(e) => return self.fail(e.into()),
        };
        self.set_phase(UpdatePhase::Downloaded);

        match self.hand_off(&package) {
            Ok(()) => {
                self.set_phase(UpdatePhase::HandoffLaunched);
                UpdateOutcome::HandoffLaunched {
                    version: package.version,
                }
            }
            Err(e) => {
                remove_quietly(&package.binary_path);
                UpdateNotes::discard(&self.data_dir);
                self.fail(e)
            }
        }
    }

    fn hand_off(&self, package: &UpdatePackage) -> Result<(), UpdateError> {
        UpdateNotes::new(&package.version, &package.notes).save(&self.data_dir)?;

        let spec = HandoffSpec::new(
            &self.target.current_exe,
            &package.binary_path,
            &self.script_dir,
            self.handoff_delay,
        )
        .with_relaunch_args(["status", "--data-dir", self.data_dir.as_str()]);
        self.launcher.launch(&spec)?;
        Ok(())
    }

    fn check_failed(&self, mode: CheckMode, error: UpdateError) -> UpdateOutcome {
        match mode {
            CheckMode::Silent => {
                tracing::warn!("Silent update check failed: {}", error);
                self.set_phase(UpdatePhase::Idle);
                UpdateOutcome::NoInformation
            }
            CheckMode::Explicit => self.fail(error),
        }
    }

    fn fail(&self, error: UpdateError) -> UpdateOutcome {
        tracing::error!("Self-update failed: {}", error);
        self.set_phase(UpdatePhase::Failed);
        UpdateOutcome::Failed(error)
    }
}
