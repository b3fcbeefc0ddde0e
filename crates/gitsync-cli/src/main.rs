//! git-sync
//!
//! Sidecar that keeps a directory pointed at the latest revision of a remote
//! git ref and pings a callback URL after every update.

mod cli;
mod error;
mod logging;

use clap::Parser;
use colored::Colorize;
use gitsync_core::{Collaborators, RunOutcome, SyncConfig, SyncEngine, SyncResult, shutdown_channel};
use tracing::{info, warn};

use cli::Cli;
use error::{CliError, Result};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    logging::init(&cli.log_config())?;
    let config = cli.sync_config()?;
    sync(config).await
}

async fn sync(config: SyncConfig) -> Result<()> {
    let (handle, shutdown) = shutdown_channel();
    let collaborators = Collaborators::git(&config)?;
    let mut engine = SyncEngine::new(config, collaborators, shutdown)?;

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal");
        handle.trigger();
    });

    match engine.run().await {
        RunOutcome::Completed(SyncResult::Failed(error)) => Err(error.into()),
        RunOutcome::GaveUp { failures, error } => Err(CliError::GaveUp {
            failures,
            source: error,
        }),
        RunOutcome::Completed(_) | RunOutcome::Interrupted => {
            info!("git-sync stopped");
            Ok(())
        }
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
