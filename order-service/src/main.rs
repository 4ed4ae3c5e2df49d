//! order-service: order ingestion and lookup server
//!
//! - Consumes order messages from the TCP ingest transport
//! - Persists them in PostgreSQL and caches them
//! - Serves lookups over HTTP

use order_service::api;
use order_service::core::{AppState, BackgroundTasks, Config, TaskKind};
use order_service::ingest::{self, TcpIngestListener};
use order_service::utils::logger;
use tokio_util::sync::CancellationToken;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Messages buffered between producer connections and the ingestion loop
const INGEST_CHANNEL_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;
    logger::init_logger(logger::DEFAULT_FILTER, config.environment == "production");

    tracing::info!("Starting order-service (env: {})", config.environment);

    let state = AppState::new(&config).await?;
    tokio::spawn(watch_shutdown(
        state.shutdown.clone(),
        state.abort.clone(),
        config.shutdown_grace,
    ));

    // Warm-up is best-effort: a cold cache only costs latency
    if let Err(e) = state
        .orders
        .warm_cache(config.cache_warmup_limit, &state.shutdown)
        .await
    {
        tracing::warn!(error = %e, "Cache warm-up failed, starting with a cold cache");
    }

    let mut tasks = BackgroundTasks::new(state.shutdown.clone());
    match &config.ingest_addr {
        Some(addr) => {
            let (sink, source) = ingest::channel(INGEST_CHANNEL_CAPACITY);
            let listener = TcpIngestListener::bind(addr, sink, tasks.shutdown_token()).await?;
            tasks.spawn("ingest_listener", TaskKind::Listener, listener.run());

            let adapter = state.ingest.clone();
            let shutdown = tasks.shutdown_token();
            tasks.spawn("ingest_loop", TaskKind::Worker, async move {
                adapter.run(source, shutdown).await;
            });
        }
        None => tracing::warn!("INGEST_ADDR is empty, ingestion disabled"),
    }
    tasks.log_summary();

    let app = api::create_router(state.clone());
    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("order-service HTTP listening on {http_addr}");

    axum::serve(http_listener, app)
        .with_graceful_shutdown(state.shutdown.clone().cancelled_owned())
        .await?;

    tasks.shutdown(config.shutdown_grace, &state.abort).await;
    tracing::info!("order-service stopped");
    Ok(())
}

/// Cancel `shutdown` on a signal, then `abort` once `grace` has elapsed
async fn watch_shutdown(
    shutdown: CancellationToken,
    abort: CancellationToken,
    grace: std::time::Duration,
) {
    shutdown_signal().await;
    shutdown.cancel();

    tokio::time::sleep(grace).await;
    if !abort.is_cancelled() {
        tracing::warn!("Shutdown grace period elapsed, aborting in-flight work");
        abort.cancel();
    }
}

/// Listens for SIGTERM and Ctrl+C
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
