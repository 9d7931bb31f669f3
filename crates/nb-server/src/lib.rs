//! nb-server: HTTP API, conversion workers and artifact housekeeping.
//!
//! This crate ties the other nb-* crates into a running service. It
//! provides:
//!
//! - Axum-based HTTP API with API key auth, per-key rate limiting and an
//!   OpenAPI document
//! - A bounded work queue drained by a fixed pool of conversion workers
//! - A periodic sweeper that removes expired artifacts and old jobs
//! - Graceful shutdown via signal handling

pub mod artifacts;
pub mod context;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use nb_convert::{CapabilityRegistry, Dispatcher, SystemConverter, ToolRegistry};
use nb_core::config::Config;
use nb_core::SystemClock;
use tokio_util::sync::CancellationToken;

use crate::context::AppContext;
use crate::jobs::manager::JobManager;
use crate::jobs::sweeper::{run_sweeper, SweepPolicy};
use crate::jobs::worker::spawn_workers;

/// Start the NodeBlack server.
///
/// Opens the database, discovers conversion tools, starts the worker pool
/// and sweeper, then serves HTTP until a shutdown signal arrives. Workers
/// finish the job they are running before the function returns.
pub async fn start(config: Config) -> nb_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    for dir in [&config.storage.input_dir, &config.storage.output_dir] {
        std::fs::create_dir_all(dir).map_err(|e| nb_core::Error::Io { source: e })?;
    }

    // Initialize database.
    let db_path = &config.server.db_path;
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| nb_core::Error::Io { source: e })?;
    }
    let existed = db_path.exists();
    let db = nb_db::pool::init_pool(db_path)?;
    if existed {
        tracing::info!("Database opened (existing) at {}", db_path.display());
    } else {
        tracing::info!("Database created (new) at {}", db_path.display());
    }

    // Discover external tools and decide availability once.
    let tools = Arc::new(ToolRegistry::discover(&config.tools));
    for info in tools.check_all() {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {}", info.name);
        }
    }
    let registry = Arc::new(CapabilityRegistry::build(&tools, &config.tools));
    for info in registry.report() {
        if let Some(reason) = &info.reason {
            tracing::warn!("{} conversion disabled: {reason}", info.capability);
        }
    }

    let (manager, rx) = JobManager::new(
        &config,
        db.clone(),
        Arc::new(SystemClock),
        Dispatcher::new(registry),
        Arc::new(SystemConverter::new(tools.clone())),
    );
    let orphaned = manager.fail_orphaned().await?;
    if orphaned > 0 {
        tracing::warn!("Marked {orphaned} interrupted job(s) as failed");
    }
    let manager = Arc::new(manager);

    let config = Arc::new(config);
    let ctx = AppContext::new(config.clone(), db, manager.clone(), tools)
        .with_metrics(metrics::install_recorder());

    let cancel = CancellationToken::new();

    let mut handles = spawn_workers(manager.clone(), rx, config.jobs.workers, cancel.clone());
    handles.push(tokio::spawn(run_sweeper(
        manager,
        SweepPolicy::from_config(&config),
        cancel.clone(),
    )));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| nb_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let app = router::build_router(ctx);

    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| nb_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await;

    // Signal workers and the sweeper to stop, then wait for them.
    cancel.cancel();
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!("Background task panicked: {e}");
        }
    }

    served.map_err(|e| nb_core::Error::Io { source: e })?;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
}
