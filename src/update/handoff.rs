//! Executable replacement through a detached helper script.
//!
//! A running Windows executable cannot overwrite itself. The switcher writes a `.bat`
//! script that waits for it to exit, swaps the binaries, starts the new one and
//! deletes itself.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::time::Duration;
use thiserror::Error;

#[cfg(windows)]
const CREATE_NEW_CONSOLE: u32 = 0x0000_0010;

#[derive(Error, Debug)]
pub enum HandoffError {
    #[error("Self-update is only supported on Windows")]
    UnsupportedPlatform,

    #[error("Failed to write update script {path}: {source}")]
    WriteScript {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start update script {path}: {source}")]
    Spawn {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything the helper script needs to replace the running executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffSpec {
    pub current_exe: Utf8PathBuf,
    pub new_exe: Utf8PathBuf,
    pub script_path: Utf8PathBuf,
    pub delay: Duration,
    /// Arguments passed to the new executable when it is started again
    pub relaunch_args: Vec<String>,
}

impl HandoffSpec {
    /// Spec with the script placed in `script_dir` under a per-process name.
    pub fn new(
        current_exe: impl Into<Utf8PathBuf>,
        new_exe: impl Into<Utf8PathBuf>,
        script_dir: &Utf8Path,
        delay: Duration,
    ) -> Self {
        Self {
            current_exe: current_exe.into(),
            new_exe: new_exe.into(),
            script_path: script_dir.join(format!(
                "updater_{}_{}.bat",
                crate::APP_NAME,
                std::process::id()
            )),
            delay,
            relaunch_args: Vec::new(),
        }
    }

    pub fn with_relaunch_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relaunch_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Batch script performing wait, delete, move, relaunch and self-delete.
    pub fn render_script(&self) -> String {
        // a failed delete is tolerated, move /Y still overwrites
        format!(
            r#"@echo off
title {app} Updater - Do Not Close This Window
echo Applying update for {app}... Please wait.
timeout /t {delay} /nobreak > nul
del /Q /F "{current}" > nul 2>&1
move /Y "{new}" "{current}" > nul
if errorlevel 1 (
    echo Update failed. Download the new version manually.
    pause
    exit /b 1
)
echo Update complete. Restarting...
start "" "{current}"{args}
(goto) 2>nul & del "%~f0"
"#,
            app = crate::APP_NAME,
            delay = self.delay.as_secs().max(1),
            current = windows_path(&self.current_exe),
            new = windows_path(&self.new_exe),
            args = self.quoted_args(),
        )
    }

    fn quoted_args(&self) -> String {
        self.relaunch_args
            .iter()
            .map(|arg| format!(" \"{}\"", arg))
            .collect()
    }
}

fn windows_path(path: &Utf8Path) -> String {
    path.as_str().replace('/', "\\")
}

/// Starts the replacement process. The caller must exit right after a successful launch.
#[cfg_attr(test, mockall::automock)]
pub trait HandoffLauncher: Send + Sync {
    fn launch(&self, spec: &HandoffSpec) -> Result<(), HandoffError>;
}

/// Writes the batch script and runs it in its own visible console
#[derive(Debug, Clone, Default)]
pub struct BatchHandoffLauncher;

impl BatchHandoffLauncher {
    pub fn new() -> Self {
        Self
    }

    #[cfg(windows)]
    fn spawn(&self, script: &Utf8Path) -> std::io::Result<()> {
        use std::os::windows::process::CommandExt;

        std::process::Command::new("cmd")
            .args(["/C", script.as_str()])
            .creation_flags(CREATE_NEW_CONSOLE)
            .spawn()
            .map(|_| ())
    }
}

impl HandoffLauncher for BatchHandoffLauncher {
    fn launch(&self, spec: &HandoffSpec) -> Result<(), HandoffError> {
        if !cfg!(windows) {
            return Err(HandoffError::UnsupportedPlatform);
        }

        fs::write(&spec.script_path, spec.render_script()).map_err(|source| {
            HandoffError::WriteScript {
                path: spec.script_path.clone(),
                source,
            }
        })?;
        tracing::info!("Update script written to {}", spec.script_path);

        #[cfg(windows)]
        if let Err(source) = self.spawn(&spec.script_path) {
            super::download::remove_quietly(&spec.script_path);
            return Err(HandoffError::Spawn {
                path: spec.script_path.clone(),
                source,
            });
        }

        tracing::info!(
            "Update script launched, {} will be replaced by {}",
            spec.current_exe,
            spec.new_exe
        );
        Ok(())
    }
}
