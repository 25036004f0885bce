//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use trowmod_switcher::PathKey;

/// TROW Mod Switcher - install, update and remove the TROW Mod for RotWK
#[derive(Parser, Debug)]
#[command(name = "trowmod-switcher")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging (also `debug_mode: true` in config.yaml)
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Game installation directory, overriding the stored one
    #[arg(long, global = true, env = "TROWMOD_GAME_PATH")]
    pub game_path: Option<Utf8PathBuf>,

    /// Data directory holding config.yaml and logs
    #[arg(long, global = true)]
    pub data_dir: Option<Utf8PathBuf>,

    /// Skip the update check performed on startup
    #[arg(long, global = true)]
    pub no_update_check: bool,

    /// Defaults to `status` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// The requested command, `status` when none was given
    pub fn command_or_default(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Status)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show configured paths, the installed mod version and the latest release
    Status,

    /// Build and install the mod from a local source tree
    Install {
        /// Mod source directory (stored for next time); defaults to the stored one
        #[arg(long)]
        source: Option<Utf8PathBuf>,
    },

    /// Download the latest mod release from GitHub and install it
    InstallLatest,

    /// Remove every mod file and restore the original asset.dat
    Remove,

    /// Update the switcher itself to the latest release
    SelfUpdate {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Read or change stored paths
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Start the game
    Launch,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Print one stored path, or all of them
    Get {
        /// game_path or local_mod_path
        key: Option<PathKey>,
    },

    /// Store a path
    Set { key: PathKey, value: Utf8PathBuf },

    /// Clear a stored path
    Unset { key: PathKey },
}

impl Commands {
    /// Whether the startup update check should run before this command
    pub fn wants_startup_check(&self) -> bool {
        !matches!(self, Commands::SelfUpdate { .. } | Commands::Config(_))
    }
}
