//! TROW Mod Switcher - command line front end
//!
//! Initializes, in order:
//! - Configuration ([`ConfigManager`]) from `%LOCALAPPDATA%\RotWKTROWModSwitcher\config.yaml`
//! - Logging (daily rotating file in the data directory's `logs` folder)
//! - Tokio runtime (blocking pool for archive builds, async HTTP)
//! - State management ([`StateManager`]) with a listener thread rendering events
//!
//! Then shows the notes of a just-applied update, runs the startup update check and
//! dispatches the subcommand. The process exits early only after a self-update handoff
//! was launched, so the helper script can replace the executable.

mod cli;

use anyhow::{Context, Result, anyhow, bail};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use cli::{Cli, Commands, ConfigCommands};
use dialoguer::Confirm;
use std::sync::Arc;
use trowmod_switcher::logging::{self, LOG_PREFIX};
use trowmod_switcher::models::{Operation, PathKey, UserConfig};
use trowmod_switcher::services::{
    BuildOrchestrator, BuildReport, LOCAL_VERSION, ModFileManager, ModRetriever, RemovalReport,
    GAME_EXE_NAME, RestoreOutcome, VersionMarker, is_game_dir, launch_game,
};
use trowmod_switcher::update::{
    BatchHandoffLauncher, CheckMode, ReleaseChecker, SelfUpdateCoordinator, UpdateDownloader,
    UpdateNotes, UpdateOffer, UpdateOutcome, UpdateTarget,
};
use trowmod_switcher::{APP_NAME, ConfigManager, StateChange, StateManager, VERSION};

/// Whether the process keeps running after a command
enum Flow {
    Continue,
    /// A handoff script is waiting for this process to exit
    ExitForHandoff,
}

struct App {
    config: ConfigManager,
    user_config: UserConfig,
    state: Arc<StateManager>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => ConfigManager::default_dir()?,
    };
    let config = ConfigManager::new(&data_dir)?;
    let mut user_config = config.load_user_config()?;
    if let Some(game_path) = &cli.game_path {
        user_config.paths.game_path = Some(game_path.clone());
    }

    let guard = logging::setup_logging_with_console(
        &config.log_dir(),
        LOG_PREFIX,
        cli.debug || user_config.debug_mode,
        true,
    )?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    show_pending_notes(config.config_dir());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(4)
        .thread_name("trowmod-worker")
        .build()?;

    let state = Arc::new(StateManager::new());
    let listener = spawn_state_listener(&state);
    state.load_from_user_config(&user_config);

    let app = App {
        config,
        user_config,
        state,
    };

    let result = runtime.block_on(async {
        let command = cli.command_or_default();
        let check = command.wants_startup_check()
            && app.user_config.update.check_on_startup
            && !cli.no_update_check;
        if check {
            if let Flow::ExitForHandoff = startup_update_check(&app).await {
                return Ok(Flow::ExitForHandoff);
            }
        }
        run_command(&app, command).await
    });

    if let Ok(Flow::ExitForHandoff) = result {
        tracing::info!("Exiting so the updater can replace {}", APP_NAME);
        println!("Restarting to finish the update...");
        drop(guard);
        std::process::exit(0);
    }

    drop(app);
    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    let _ = listener.join();

    result.map(|_| ())
}

/// Print the notes left behind by the update that produced this binary.
fn show_pending_notes(data_dir: &Utf8Path) {
    match UpdateNotes::take(data_dir) {
        Ok(Some(notes)) => {
            println!("Updated to version {}.", notes.version);
            if !notes.notes.trim().is_empty() {
                println!("\nWhat's new:\n{}\n", notes.notes.trim());
            }
        }
        Ok(None) => {}
        Err(e) => tracing::warn!("Could not show update notes: {}", e),
    }
}

/// Render state events on a background thread, like a GUI would.
fn spawn_state_listener(state: &Arc<StateManager>) -> std::thread::JoinHandle<()> {
    let mut rx = state.subscribe();
    std::thread::spawn(move || {
        while let Ok(change) = rx.blocking_recv() {
            match change {
                StateChange::OperationStarted { operation } => println!("==> {}...", operation),
                StateChange::OperationFinished {
                    operation,
                    success,
                    message,
                } => {
                    let verdict = if success { "done" } else { "FAILED" };
                    println!("<== {}: {} {}", operation, verdict, message);
                }
                StateChange::UpdatePhaseChanged { phase } => {
                    tracing::debug!("Update phase changed: {}", phase)
                }
                other => tracing::debug!("State change: {:?}", other),
            }
        }
    })
}

async fn run_command(app: &App, command: Commands) -> Result<Flow> {
    match command {
        Commands::Status => status(app).await.map(|_| Flow::Continue),
        Commands::Install { source } => install_local(app, source).await.map(|_| Flow::Continue),
        Commands::InstallLatest => install_latest(app).await.map(|_| Flow::Continue),
        Commands::Remove => remove(app).map(|_| Flow::Continue),
        Commands::SelfUpdate { yes } => self_update(app, yes).await,
        Commands::Config(cmd) => config_command(app, cmd).map(|_| Flow::Continue),
        Commands::Launch => {
            launch_game(&game_dir(app)?)?;
            println!("Game launched.");
            Ok(Flow::Continue)
        }
    }
}

fn game_dir(app: &App) -> Result<Utf8PathBuf> {
    let path = app
        .user_config
        .paths
        .game_path
        .clone()
        .ok_or_else(|| anyhow!("No game path set. Use `config set game_path <dir>` or --game-path"))?;
    if !path.is_dir() {
        bail!("Game path {} does not exist", path);
    }
    if !is_game_dir(&path) {
        tracing::warn!("{} has no {}, is this the RotWK folder?", path, GAME_EXE_NAME);
    }
    Ok(path)
}

async fn status(app: &App) -> Result<()> {
    println!("{} v{}", APP_NAME, VERSION);
    println!("Data directory:   {}", app.config.config_dir());

    for key in PathKey::ALL {
        let value = app
            .user_config
            .paths
            .get(key)
            .map(|p| p.to_string())
            .unwrap_or_else(|| "(not set)".to_string());
        println!("{:<17} {}", format!("{}:", key), value);
    }

    if let Ok(dir) = game_dir(app) {
        app.state.set_installed(VersionMarker::read(&dir));
    }

    let checker = ReleaseChecker::new(&app.user_config.network)?;
    let latest = checker
        .latest_tag(&app.user_config.repositories.mod_repo)
        .await;
    app.state.set_latest_mod_version(latest);

    let snapshot = app.state.snapshot();
    println!("Installed mod:    {}", snapshot.installed);
    println!(
        "Latest release:   {}",
        snapshot.latest_mod_version.as_deref().unwrap_or("unknown")
    );
    if snapshot.is_mod_outdated() {
        println!("A newer mod release is available. Run `install-latest` to update.");
    }
    Ok(())
}

async fn install_local(app: &App, source: Option<Utf8PathBuf>) -> Result<()> {
    let install_dir = game_dir(app)?;
    let source = match source {
        Some(source) => {
            app.config
                .set_path(PathKey::LocalModPath, Some(source.clone()))?;
            source
        }
        None => app
            .user_config
            .paths
            .local_mod_path
            .clone()
            .ok_or_else(|| anyhow!("No mod source set. Pass --source <dir>"))?,
    };

    begin(app, Operation::InstallLocal)?;
    let result = BuildOrchestrator::new()
        .build_all(&source, &install_dir, LOCAL_VERSION)
        .await;
    let report = finish(app, result.map_err(Into::into), |r: &BuildReport| {
        (r.success(), summarize_build(r))
    })?;
    app.state.set_installed(VersionMarker::read(&install_dir));

    print_build_report(&report);
    if !report.success() {
        bail!("Installation failed");
    }
    Ok(())
}

async fn install_latest(app: &App) -> Result<()> {
    let install_dir = game_dir(app)?;
    let retriever = ModRetriever::new(&app.user_config.network, BuildOrchestrator::new())?;

    begin(app, Operation::InstallLatest)?;
    let result = retriever
        .install_latest(&app.user_config.repositories.mod_repo, &install_dir)
        .await;
    let report = finish(app, result, |r: &BuildReport| {
        (r.success(), summarize_build(r))
    })?;
    app.state.set_installed(VersionMarker::read(&install_dir));

    print_build_report(&report);
    if !report.success() {
        bail!("Installation of {} failed", report.version);
    }
    Ok(())
}

fn remove(app: &App) -> Result<()> {
    let install_dir = game_dir(app)?;

    begin(app, Operation::Remove)?;
    let result = ModFileManager::new().remove_all(&install_dir);
    let report = finish(app, result.map_err(Into::into), |r: &RemovalReport| {
        (
            r.is_success(),
            format!("{} removed, {} not present", r.removed.len(), r.absent.len()),
        )
    })?;
    app.state.set_installed(VersionMarker::read(&install_dir));

    for failure in &report.failures {
        println!("  ! {}", failure);
    }
    match &report.asset {
        RestoreOutcome::Restored => println!("  Original asset.dat restored"),
        RestoreOutcome::NothingToRestore => {}
        RestoreOutcome::Failed(e) => println!("  ! Could not restore asset.dat: {}", e),
    }
    if report.needs_elevation() {
        println!("Some files are protected. Run the switcher as administrator.");
    }
    if !report.is_success() {
        bail!("Removal incomplete");
    }
    Ok(())
}

fn begin(app: &App, operation: Operation) -> Result<()> {
    if !app.state.begin_operation(operation) {
        bail!("Another operation is already running");
    }
    Ok(())
}

/// Record the outcome of the running operation and pass the value through.
fn finish<T>(
    app: &App,
    result: Result<T>,
    describe: impl FnOnce(&T) -> (bool, String),
) -> Result<T> {
    match result {
        Ok(value) => {
            let (success, message) = describe(&value);
            app.state.finish_operation(success, message);
            Ok(value)
        }
        Err(e) => {
            app.state.finish_operation(false, e.to_string());
            Err(e)
        }
    }
}

fn summarize_build(report: &BuildReport) -> String {
    format!(
        "{}/{} archives built in {:.1?}",
        report.results.iter().filter(|r| r.success).count(),
        report.results.len(),
        report.duration
    )
}

fn print_build_report(report: &BuildReport) {
    for result in &report.results {
        match &result.error {
            None => println!("  [ok]     {}", result.task),
            Some(e) => println!("  [failed] {}: {}", result.task, e),
        }
    }
    if let Some(e) = &report.marker_error {
        println!("  Could not record the installed version: {}", e);
    }
    if report.needs_elevation() {
        println!("Some files are protected. Run the switcher as administrator.");
    }
    if report.success() {
        println!("Mod version {} installed. You can now launch the game.", report.version);
    }
}

fn build_coordinator(app: &App) -> Result<SelfUpdateCoordinator> {
    let network = &app.user_config.network;
    let repos = &app.user_config.repositories;

    let current_exe = std::env::current_exe().context("Cannot locate the running executable")?;
    let current_exe = Utf8PathBuf::from_path_buf(current_exe)
        .map_err(|p| anyhow!("Executable path is not UTF-8: {}", p.display()))?;

    let coordinator = SelfUpdateCoordinator::new(
        ReleaseChecker::new(network)?,
        UpdateDownloader::new(network)?.with_progress(true),
        Box::new(BatchHandoffLauncher::new()),
        UpdateTarget {
            repo: repos.switcher_repo.clone(),
            asset_name: repos.switcher_asset.clone(),
            current_version: VERSION.to_string(),
            current_exe,
        },
        app.config.config_dir(),
    )
    .with_handoff_delay(app.user_config.update.handoff_delay());

    // mirror coordinator phases into the shared state
    let mut phases = coordinator.subscribe();
    let state = Arc::clone(&app.state);
    tokio::spawn(async move {
        while phases.changed().await.is_ok() {
            let phase = *phases.borrow_and_update();
            state.set_update_phase(phase);
        }
    });

    Ok(coordinator)
}

fn ask_to_update(offer: &UpdateOffer) -> bool {
    println!("A new version of {} is available: {}", APP_NAME, offer.version);
    if !offer.notes.trim().is_empty() {
        println!("\nRelease notes:\n{}\n", offer.notes.trim());
    }
    Confirm::new()
        .with_prompt("Download and install it now?")
        .default(true)
        .interact()
        .unwrap_or(false)
}

async fn startup_update_check(app: &App) -> Flow {
    let coordinator = match build_coordinator(app) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Startup update check unavailable: {}", e);
            return Flow::Continue;
        }
    };

    match coordinator.run(CheckMode::Silent, ask_to_update).await {
        UpdateOutcome::HandoffLaunched { .. } => Flow::ExitForHandoff,
        UpdateOutcome::Failed(e) => {
            println!("Update failed: {}", e);
            Flow::Continue
        }
        _ => Flow::Continue,
    }
}

async fn self_update(app: &App, yes: bool) -> Result<Flow> {
    let coordinator = build_coordinator(app)?;

    begin(app, Operation::SelfUpdate)?;
    let outcome = coordinator
        .run(CheckMode::Explicit, |offer| yes || ask_to_update(offer))
        .await;

    match outcome {
        UpdateOutcome::HandoffLaunched { version } => {
            app.state
                .finish_operation(true, format!("restarting into {}", version));
            Ok(Flow::ExitForHandoff)
        }
        UpdateOutcome::UpToDate { latest } => {
            app.state.finish_operation(true, "up to date");
            println!("{} v{} is up to date (latest release {}).", APP_NAME, VERSION, latest);
            Ok(Flow::Continue)
        }
        UpdateOutcome::Declined { version } => {
            app.state.finish_operation(true, "declined");
            println!("Update to {} skipped.", version);
            Ok(Flow::Continue)
        }
        UpdateOutcome::NoInformation => {
            app.state.finish_operation(false, "no update information");
            bail!("Could not determine whether an update is available")
        }
        UpdateOutcome::Failed(e) => {
            app.state.finish_operation(false, e.to_string());
            Err(e.into())
        }
    }
}

fn config_command(app: &App, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Get { key } => {
            let keys = match key {
                Some(key) => vec![key],
                None => PathKey::ALL.to_vec(),
            };
            for key in keys {
                let value = app.config.get_path(key)?;
                println!(
                    "{} = {}",
                    key,
                    value.map(|p| p.to_string()).unwrap_or_default()
                );
            }
        }
        ConfigCommands::Set { key, value } => {
            if !value.is_dir() {
                tracing::warn!("{} does not exist (yet)", value);
            } else if key == PathKey::GamePath && !is_game_dir(&value) {
                println!(
                    "Warning: {} was not found in {}. Check the game path.",
                    GAME_EXE_NAME, value
                );
            }
            app.config.set_path(key, Some(value.clone()))?;
            match key {
                PathKey::GamePath => app.state.set_game_path(Some(value)),
                PathKey::LocalModPath => app.state.set_local_mod_path(Some(value)),
            };
            println!("{} updated.", key);
        }
        ConfigCommands::Unset { key } => {
            app.config.set_path(key, None)?;
            match key {
                PathKey::GamePath => app.state.set_game_path(None),
                PathKey::LocalModPath => app.state.set_local_mod_path(None),
            };
            println!("{} cleared.", key);
        }
    }
    Ok(())
}
