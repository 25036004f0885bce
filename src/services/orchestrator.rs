// Parallel build of every mod archive followed by the version marker.

use super::marker::VersionMarker;
use super::packaging::{BuildTask, PackageBuilder, PackageError, PackageOutput};
use camino::{Utf8Path, Utf8PathBuf};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinSet;

/// Input validation failures; nothing has been touched when one is returned
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Mod source directory not found: {0}")]
    SourceNotFound(Utf8PathBuf),

    #[error("Game installation directory not found: {0}")]
    InstallDirNotFound(Utf8PathBuf),

    #[error("Mod version must not be empty")]
    EmptyVersion,
}

/// Outcome of one build task
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub task: String,
    pub success: bool,
    pub error: Option<String>,
    pub output: Option<PackageOutput>,
    pub duration: Duration,
    /// Failed because the installation directory is not writable
    pub permission_denied: bool,
}

impl BuildResult {
    fn from_outcome(
        task: String,
        outcome: Result<PackageOutput, PackageError>,
        duration: Duration,
    ) -> Self {
        match outcome {
            Ok(output) => Self {
                task,
                success: true,
                error: None,
                output: Some(output),
                duration,
                permission_denied: false,
            },
            Err(e) => Self {
                task,
                success: false,
                permission_denied: e.is_permission_denied(),
                error: Some(error_chain(&e)),
                output: None,
                duration,
            },
        }
    }
}

/// Aggregate of a `build_all` run, results in completion order
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub version: String,
    pub results: Vec<BuildResult>,
    pub marker_written: bool,
    pub marker_error: Option<String>,
    pub duration: Duration,
}

impl BuildReport {
    /// Every task succeeded and the marker was written
    pub fn success(&self) -> bool {
        self.all_tasks_succeeded() && self.marker_written
    }

    pub fn all_tasks_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &BuildResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn needs_elevation(&self) -> bool {
        self.results.iter().any(|r| r.permission_denied)
    }
}

/// Runs every [`BuildTask`] concurrently on the blocking pool.
#[derive(Debug, Clone)]
pub struct BuildOrchestrator {
    tasks: Vec<BuildTask>,
    builder: Arc<PackageBuilder>,
}

impl Default for BuildOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildOrchestrator {
    pub fn new() -> Self {
        Self::with_tasks(BuildTask::standard_set())
    }

    pub fn with_tasks(tasks: Vec<BuildTask>) -> Self {
        Self {
            tasks,
            builder: Arc::new(PackageBuilder::new()),
        }
    }

    pub fn tasks(&self) -> &[BuildTask] {
        &self.tasks
    }

    /// Build every archive and record `mod_version` if all of them succeed.
    ///
    /// # Arguments
    /// * `source_root` - Mod source tree containing the task subtrees
    /// * `install_dir` - Game installation directory
    /// * `mod_version` - Version written to the marker on success
    ///
    /// # Returns
    /// A report for every task; `Err` only for invalid input
    pub async fn build_all(
        &self,
        source_root: &Utf8Path,
        install_dir: &Utf8Path,
        mod_version: &str,
    ) -> Result<BuildReport, BuildError> {
        if !source_root.is_dir() {
            return Err(BuildError::SourceNotFound(source_root.to_path_buf()));
        }
        if !install_dir.is_dir() {
            return Err(BuildError::InstallDirNotFound(install_dir.to_path_buf()));
        }
        if mod_version.trim().is_empty() {
            return Err(BuildError::EmptyVersion);
        }

        tracing::info!(
            "Building {} archives from {} into {} (version {})",
            self.tasks.len(),
            source_root,
            install_dir,
            mod_version
        );
        let started = Instant::now();

        let mut set = JoinSet::new();
        for task in &self.tasks {
            let task = task.clone();
            let builder = Arc::clone(&self.builder);
            let source_root = source_root.to_path_buf();
            let install_dir = install_dir.to_path_buf();

            set.spawn_blocking(move || {
                let start = Instant::now();
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    builder.build(&task, &source_root, &install_dir)
                }))
                .unwrap_or_else(|panic| Err(PackageError::Panicked(panic_message(&*panic))));
                BuildResult::from_outcome(task.name, outcome, start.elapsed())
            });
        }

        let mut results = Vec::with_capacity(self.tasks.len());
        while let Some(joined) = set.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!("Build task could not be joined: {}", e);
                    BuildResult {
                        task: "unknown".to_string(),
                        success: false,
                        error: Some(e.to_string()),
                        output: None,
                        duration: Duration::ZERO,
                        permission_denied: false,
                    }
                }
            };

            if result.success {
                tracing::info!("[{}] Completed in {:?}", result.task, result.duration);
            } else {
                tracing::error!(
                    "[{}] Failed: {}",
                    result.task,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(result);
        }

        let mut report = BuildReport {
            version: mod_version.to_string(),
            results,
            marker_written: false,
            marker_error: None,
            duration: Duration::ZERO,
        };

        if report.all_tasks_succeeded() {
            match VersionMarker::new(mod_version).write(install_dir) {
                Ok(()) => report.marker_written = true,
                Err(e) => {
                    tracing::error!("Archives built but the version marker failed: {}", e);
                    report.marker_error = Some(e.to_string());
                }
            }
        } else {
            tracing::warn!(
                "{} of {} archives failed, version marker left unchanged",
                report.failed().count(),
                report.results.len()
            );
        }

        report.duration = started.elapsed();
        Ok(report)
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::marker::MarkerStatus;
    use crate::services::packaging::StagingLayout;
    use std::fs;
    use tempfile::TempDir;

    fn utf8_dir(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_invalid_input_is_rejected() {
        let dir = TempDir::new().unwrap();
        let root = utf8_dir(&dir);
        let orchestrator = BuildOrchestrator::new();

        let missing = root.join("nope");
        assert!(matches!(
            tokio_test::block_on(orchestrator.build_all(&missing, &root, "v1")),
            Err(BuildError::SourceNotFound(_))
        ));
        assert!(matches!(
            tokio_test::block_on(orchestrator.build_all(&root, &missing, "v1")),
            Err(BuildError::InstallDirNotFound(_))
        ));
        assert!(matches!(
            tokio_test::block_on(orchestrator.build_all(&root, &root, "  ")),
            Err(BuildError::EmptyVersion)
        ));
    }

    #[tokio::test]
    async fn test_failure_is_isolated_and_marker_skipped() {
        let src = TempDir::new().unwrap();
        let install = TempDir::new().unwrap();
        let src_root = utf8_dir(&src);
        let install_root = utf8_dir(&install);
        fs::create_dir_all(src_root.join("one")).unwrap();
        fs::write(src_root.join("one/a.txt"), "a").unwrap();

        let orchestrator = BuildOrchestrator::with_tasks(vec![
            BuildTask::new("ONE", "one", "one.big", StagingLayout::Flatten),
            BuildTask::new("TWO", "two", "two.big", StagingLayout::Flatten),
        ]);
        let report = orchestrator
            .build_all(&src_root, &install_root, "v1")
            .await
            .unwrap();

        assert!(!report.success());
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.failed().count(), 1);
        assert_eq!(report.failed().next().unwrap().task, "TWO");
        assert!(install_root.join("one.big").exists());
        assert!(!report.marker_written);
        assert_eq!(VersionMarker::read(&install_root), MarkerStatus::Missing);
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*boxed), "boom");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*boxed), "bang");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(42);
        assert_eq!(panic_message(&*boxed), "unknown panic");
    }

    #[test]
    fn test_error_chain_includes_source() {
        let err = PackageError::Commit {
            path: "x.big".into(),
            source: std::io::Error::other("disk full"),
        };
        let text = error_chain(&err);
        assert!(text.contains("x.big"));
        assert!(text.contains("disk full"));
    }
}
