//! cash - in-memory key-value cache server
//!
//! Serves the `;`-batched text protocol over TCP and persists mutations to an
//! append-only command log that is replayed on startup.

// Use jemalloc for better multi-threaded performance
#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use cash::cli::Cli;
use cash::config::Config;
use cash::engine::Engine;
use cash::health::HealthServer;
use cash::metrics::Metrics;
use cash::server::Server;
use clap::Parser;
use std::sync::Arc;
use tokio::runtime::Builder;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!("Starting cash v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    if let Some(config_path) = &cli.config {
        info!("Loading configuration from {}", config_path);
    } else {
        info!("Using default configuration (set CASH_* env vars to customize)");
    }
    let mut config = cli.load_config()?;
    cli.apply(&mut config);

    info!("Configuration: {:?}", config);

    // Build tokio runtime with configured worker threads
    let mut runtime_builder = Builder::new_multi_thread();
    if config.server.worker_threads > 0 {
        runtime_builder.worker_threads(config.server.worker_threads);
        info!("Using {} worker threads", config.server.worker_threads);
    } else {
        info!("Using default worker threads (auto-detected)");
    }
    let runtime = runtime_builder.enable_all().build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: Config) -> anyhow::Result<()> {
    // Create cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    // Initialize metrics
    let metrics = Arc::new(Metrics::new());

    // Start health server in separate thread if enabled
    let health_server = if config.metrics.enabled {
        let health = Arc::new(HealthServer::new(Arc::clone(&metrics)));
        let health_clone = Arc::clone(&health);
        let metrics_config = config.metrics.clone();

        std::thread::spawn(move || {
            if let Err(e) = health_clone.run(&metrics_config) {
                error!("Health server error: {}", e);
            }
        });

        Some(health)
    } else {
        None
    };

    // Replay the command log and start the engine
    match &config.engine.log_path {
        Some(path) => info!("Using command log at {:?}", path),
        None => info!("Running without persistence"),
    }
    let (engine, stats) = Engine::start(&config.engine, Arc::clone(&metrics), cancel_token.clone())?;
    info!(
        applied = stats.applied,
        errors = stats.errors(),
        keys = engine.key_count(),
        "Engine started"
    );

    let server = Arc::new(Server::new(
        config.server.clone(),
        engine.clone(),
        Arc::clone(&metrics),
        cancel_token.clone(),
    ));
    let listener = server.bind().await?;

    // Mark as ready after initialization
    if let Some(ref health) = health_server {
        health.set_ready(true);
        info!("Server is ready");
    }

    // Setup signal handlers
    let cancel_for_signal = cancel_token.clone();
    let health_for_signal = health_server.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down...");
            }
            _ = terminate_signal() => {
                info!("Received SIGTERM, shutting down...");
            }
        }
        cancel_for_signal.cancel();
        if let Some(health) = health_for_signal {
            health.set_ready(false);
            health.stop();
        }
    });

    // Run the main server
    if let Err(e) = Arc::clone(&server).serve(listener).await {
        error!("Server error: {}", e);
    }

    // Drain queued commands and close the log
    engine.shutdown().await;

    info!("cash stopped");
    Ok(())
}

#[cfg(unix)]
async fn terminate_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending::<()>().await;
}
