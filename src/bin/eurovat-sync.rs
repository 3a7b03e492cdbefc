//! Keeps the `vat_rates` table current: warms the cache from Postgres, syncs
//! on start and then every UTC midnight until interrupted.

use std::sync::Arc;

use anyhow::Context;
use eurovat::config::VatConfig;
use eurovat::rates::{RateCache, RateSyncer, Scheduler};
use eurovat::store::PgStore;
use tokio::signal;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    eurovat::telemetry::init();

    let config = VatConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        tedb_endpoint = %config.sync.tedb_endpoint,
        json_rates_url = %config.sync.json_rates_url,
        db_max_connections = config.database.max_connections,
        "Configuration loaded"
    );

    let store = Arc::new(
        PgStore::connect(&config.database)
            .await
            .context("failed to connect to Postgres")?,
    );
    store
        .run_migrations()
        .await
        .context("failed to run migrations")?;

    let cache = Arc::new(RateCache::new());
    let syncer = Arc::new(RateSyncer::from_config(&config.sync, store, cache)?);
    let warmed = syncer.warm_cache().await.context("failed to warm rate cache")?;
    tracing::info!(rates = warmed, "Rate cache warmed from database");

    let scheduler = Scheduler::new(syncer);
    scheduler.start();

    shutdown_signal().await;
    scheduler.stop().await;

    tracing::info!("eurovat-sync stopped");
    Ok(())
}
