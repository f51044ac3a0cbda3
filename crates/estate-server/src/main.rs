//! Estate Server: runs the SLA escalation monitor against SurrealDB.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use estate_db::repository::{
    SurrealNotificationOutbox, SurrealServiceRequestRepository, SurrealTenantRepository,
};
use estate_db::DbManager;
use estate_service::EscalationMonitor;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .json()
        .init();

    info!("Starting estate server...");

    let manager = match DbManager::open(&cli.db_config()).await {
        Ok(manager) => manager,
        Err(e) => {
            error!(error = %e, "Could not open SurrealDB");
            return ExitCode::FAILURE;
        }
    };
    let db = manager.client().clone();

    let monitor = EscalationMonitor::new(
        SurrealTenantRepository::new(db.clone()),
        SurrealServiceRequestRepository::new(db.clone()),
        SurrealNotificationOutbox::new(db),
        cli.service_config(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = tokio::spawn(async move { monitor.run(shutdown_rx).await });

    let clean = wait_for_shutdown(tokio::signal::ctrl_c()).await;
    let _ = shutdown_tx.send(true);

    if let Err(e) = runner.await {
        error!(error = %e, "Escalation monitor ended abnormally");
        return ExitCode::FAILURE;
    }

    info!("Estate server stopped.");
    if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Resolves once shutdown was requested. Returns `false` when the signal
/// could not be listened for; the monitor is stopped either way.
async fn wait_for_shutdown<F>(signal: F) -> bool
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("Shutdown requested");
            true
        }
        Err(e) => {
            error!(error = %e, "Could not listen for shutdown signal");
            false
        }
    }
}
