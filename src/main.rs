use anyhow::Context;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use loyalty_backend::{app_config, build_router, cors_layer, initialize_app_state, services};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before anything reads them
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loyalty_backend=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = app_config::AppConfig::from_env().context("Invalid configuration")?;
    info!(
        "Starting loyalty backend on {} ({})",
        config.server.bind_address, config.server.environment
    );

    let state = initialize_app_state(&config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize application state: {}", e))?;

    let cleanup = services::initialize_background_tasks(
        state.stores.credentials.clone(),
        config.auth.clone(),
        Duration::from_secs(config.events.cleanup_interval_seconds),
    );

    let events = state.events.clone();
    let app = build_router(
        state,
        cors_layer(&config.security.cors_allowed_origins, config.is_production()),
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address))?;
    info!("HTTP server listening on {}", config.server.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    cleanup.abort();

    let drain_timeout = Duration::from_secs(config.server.shutdown_drain_timeout_seconds);
    info!(pending = events.in_flight(), "Draining event log writes");
    if !events.drain(drain_timeout).await {
        warn!(
            pending = events.in_flight(),
            "Event log writes still pending after {:?}", drain_timeout
        );
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
