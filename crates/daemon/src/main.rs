mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{debug, error, info};

use courier_core::{
    load_config, validate_config, BatchScheduler, BirdDeliveryClient, Config, ConvergenceWaiter,
    Database, DeliveryClient, ExternalPdfMerger, ExternalReportInvoker, PipelineConfig,
    PipelineDeps, ProcessLock, RunOutcome, SanitizedConfig, SchedulerError,
    SqliteRegistrationSource, SqliteStateTransitioner,
};

use logging::init_logging;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        eprintln!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config_path = std::env::var("COURIER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("courier.toml"));

    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    let _log_guard = init_logging(&config.logging)
        .with_context(|| format!("Failed to initialize logging in {:?}", config.logging.dir))?;

    info!(version = VERSION, config = ?config_path, "Starting courier");
    debug!(
        "Effective configuration: {}",
        serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default()
    );

    let lock = ProcessLock::new(config.lock_path(), config.lock.clone());
    let mut scheduler = BatchScheduler::new(
        config.scheduler.clone(),
        PipelineConfig::from_config(&config),
        lock,
    );

    let handle = scheduler.shutdown_handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Termination signal received");
        handle.shutdown();
    });

    let config = &config;
    let outcome = scheduler
        .run(move || async move { build_deps(config) })
        .await
        .context("Scheduler failed")?;

    match outcome {
        RunOutcome::LockHeld => info!("Exiting, another instance is active"),
        RunOutcome::Stopped => info!("Shutdown complete"),
        RunOutcome::LockLost => {
            anyhow::bail!("Lock at {:?} was taken over by another instance", config.lock_path())
        }
    }
    Ok(())
}

/// Wires the production components. Runs only after the lock is held.
fn build_deps(config: &Config) -> Result<PipelineDeps, SchedulerError> {
    let database = Arc::new(Database::new(&config.database));
    database.verify().map_err(SchedulerError::init)?;
    info!(path = %config.database.path.display(), "Database reachable");

    let delivery: Option<Arc<dyn DeliveryClient>> = if config.delivery.enabled {
        let client =
            BirdDeliveryClient::new(config.delivery.clone()).map_err(SchedulerError::init)?;
        info!(base_url = %config.delivery.base_url, "Delivery enabled");
        Some(Arc::new(client))
    } else {
        info!("Delivery disabled");
        None
    };

    Ok(PipelineDeps {
        source: Arc::new(SqliteRegistrationSource::new(Arc::clone(&database))),
        invoker: Arc::new(ExternalReportInvoker::new(config.reports.clone())),
        waiter: Arc::new(ConvergenceWaiter::new(&config.convergence)),
        merger: Arc::new(ExternalPdfMerger::new(config.merger.clone())),
        delivery,
        transitioner: Arc::new(SqliteStateTransitioner::new(database)),
    })
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
