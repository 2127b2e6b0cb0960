//! CLI entry point for minerva-watch.
//!
//! Watches a workspace directory and runs the extract, validate and index
//! stages inside a compose service once changes have settled.
//!
//! # Usage
//!
//! ```bash
//! minerva-watch --config minerva.watch.json
//!
//! # Preview the stage commands without running them
//! minerva-watch --config minerva.watch.json --dry-run
//!
//! # Debug logging, including every accepted change
//! minerva-watch --config minerva.watch.json --verbose
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use color_eyre::eyre::WrapErr;
use mw_core::Config;
use mw_pipeline::{
    CommandRunner, DryRunRunner, Orchestrator, OrchestratorOptions, OrchestratorStats, Pipeline,
    StageRunner, format_command,
};
use mw_watcher::{FileWatcher, IgnoreFilter};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Watches a documentation workspace and re-runs the extract/validate/index
/// pipeline after each burst of changes.
#[derive(Debug, Parser)]
#[command(name = "minerva-watch", version, about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, env = "MINERVA_WATCH_CONFIG")]
    config: Utf8PathBuf,

    /// Log the resolved stage commands instead of executing them.
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default. The
/// `notify` backend is kept at `warn`.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},notify=warn,mio=warn"))
    });

    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_ansi(use_ansi))
        .with(filter)
        .init();
}

/// Loads and validates the configuration file.
fn load_config(path: &Utf8Path) -> color_eyre::Result<Config> {
    let config = Config::load(path)
        .wrap_err_with(|| format!("Failed to load configuration from {path}"))?;

    info!(
        workspace = %config.watch.root,
        compose_dir = %config.compose.directory,
        service = %config.compose.service_name,
        debounce_ms = config.watch.debounce_ms,
        validator = config.stages.validator.is_some(),
        "Configuration loaded"
    );
    Ok(config)
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Starts the watcher and runs the orchestrator until a shutdown signal.
async fn run_watch(config: Config, dry_run: bool) -> color_eyre::Result<()> {
    let pipeline = Pipeline::from_config(&config);
    for stage in pipeline.stages() {
        tracing::debug!(
            stage = stage.label(),
            command = %format_command(stage.command()),
            "Resolved stage command"
        );
    }

    let options = OrchestratorOptions::from_watch_config(&config.watch);
    let ignore = IgnoreFilter::new(&config.watch.root, &config.watch.ignore_globs)
        .wrap_err("Invalid ignore pattern")?;
    let watcher = FileWatcher::start(&config.watch.root, ignore)
        .await
        .wrap_err_with(|| format!("Failed to watch {}", config.watch.root))?;

    info!(
        path = %watcher.watch_path(),
        dry_run,
        "Watching for changes"
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(signal) => {
                info!(signal, "Received signal, shutting down");
                signal_token.cancel();
            }
            Err(err) => error!(error = %err, "Failed to listen for shutdown signals"),
        }
    });

    let working_dir = config.compose.directory.clone();
    let stats = if dry_run {
        run_with(pipeline, DryRunRunner::new(working_dir), options, watcher, shutdown).await?
    } else {
        run_with(pipeline, CommandRunner::new(working_dir), options, watcher, shutdown).await?
    };

    info!(
        changes_accepted = stats.changes_accepted,
        changes_ignored = stats.changes_ignored,
        runs_started = stats.runs_started,
        runs_succeeded = stats.runs_succeeded,
        runs_failed = stats.runs_failed,
        runs_interrupted = stats.runs_interrupted,
        "Shutdown complete"
    );
    Ok(())
}

/// Runs the orchestrator with a concrete stage runner.
async fn run_with<R: StageRunner>(
    pipeline: Pipeline,
    runner: R,
    options: OrchestratorOptions,
    watcher: FileWatcher,
    shutdown: CancellationToken,
) -> color_eyre::Result<OrchestratorStats> {
    let orchestrator = Orchestrator::new(pipeline, runner, options);
    let stats = orchestrator
        .run(watcher, shutdown)
        .await
        .wrap_err("Failed to close the file watcher")?;
    Ok(stats)
}

/// Resolves with the name of the first termination signal received.
async fn shutdown_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
            _ = sigterm.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map(|()| "Ctrl-C")
    }
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Configuration errors end the process before watching begins
    let config = load_config(&cli.config)?;

    run_watch(config, cli.dry_run).await
}
