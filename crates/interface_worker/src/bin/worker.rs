//! Ledgerlight - Background Worker Binary
//!
//! # Usage
//!
//! ```bash
//! WORKER_DATABASE_URL=postgres://... cargo run --bin invoicing-worker
//! ```
//!
//! # Environment Variables
//!
//! * `WORKER_DATABASE_URL` - PostgreSQL connection string
//! * `WORKER_MAX_CONNECTIONS` - Pool size (default: 5)
//! * `WORKER_TICK_INTERVAL_SECS` - Seconds between ticks (default: 300)
//! * `WORKER_RUN_ON_START` - Tick immediately on start (default: true)
//! * `WORKER_LOG_LEVEL` - Log level when `RUST_LOG` is unset (default: info)

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use core_kernel::{HealthCheckable, SystemClock};
use domain_invoicing::adapters::LogNotifier;
use infra_db::{create_pool, run_migrations, PostgresInvoicingAdapter};
use interface_worker::{Scheduler, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env().context("invalid WORKER_* configuration")?;
    init_tracing(&config.log_level);

    tracing::info!(
        tick_interval_secs = config.tick_interval_secs,
        run_on_start = config.run_on_start,
        "Starting invoicing worker"
    );

    let pool = create_pool(config.database())
        .await
        .context("could not connect to the database")?;
    run_migrations(&pool).await.context("could not apply migrations")?;

    let adapter = Arc::new(PostgresInvoicingAdapter::new(pool));
    let health = adapter.health_check().await;
    tracing::info!(status = ?health.status, latency_ms = health.latency_ms, "Database ready");

    let scheduler = Scheduler::new(adapter, Arc::new(LogNotifier::new()), Arc::new(SystemClock));
    scheduler
        .run(config.tick_interval(), config.run_on_start, shutdown_signal())
        .await;

    tracing::info!("Worker shutdown complete");
    Ok(())
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Resolves on Ctrl+C or SIGTERM
///
/// If a handler cannot be installed that signal is ignored rather than
/// shutting the worker down.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, finishing the current tick");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, finishing the current tick");
        }
    }
}
