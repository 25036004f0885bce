use camino::{Utf8Path, Utf8PathBuf};
use std::process::Command;
use thiserror::Error;

/// Executable of The Rise of the Witch-king
pub const GAME_EXE_NAME: &str = "lotrbfme2ep1.exe";

#[derive(Error, Debug)]
pub enum GameError {
    #[error("Game installation directory not found: {0}")]
    InstallDirNotFound(Utf8PathBuf),

    #[error("Could not find {exe} in {dir}")]
    ExecutableNotFound { exe: &'static str, dir: Utf8PathBuf },

    #[error("Failed to launch {path}: {source}")]
    Launch {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Whether `dir` looks like a RotWK installation
pub fn is_game_dir(dir: &Utf8Path) -> bool {
    dir.join(GAME_EXE_NAME).is_file()
}

/// Start the game from its installation directory without waiting for it.
pub fn launch_game(install_dir: &Utf8Path) -> Result<(), GameError> {
    if !install_dir.is_dir() {
        return Err(GameError::InstallDirNotFound(install_dir.to_path_buf()));
    }

    let exe = install_dir.join(GAME_EXE_NAME);
    if !exe.is_file() {
        return Err(GameError::ExecutableNotFound {
            exe: GAME_EXE_NAME,
            dir: install_dir.to_path_buf(),
        });
    }

    tracing::info!("Launching {}", exe);
    Command::new(&exe)
        .current_dir(install_dir)
        .spawn()
        .map_err(|source| GameError::Launch {
            path: exe.clone(),
            source,
        })?;

    Ok(())
}
