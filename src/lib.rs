// Library exports for the loyalty backend
// This file exposes modules and functions for library consumers

pub mod app;
pub mod app_config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod repository;
pub mod schema;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use app::{AppState, Backend, ServiceSettings};
pub use app_config::{AppConfig, CONFIG};
pub use db::{DatabasePools, DieselPool, RedisConfig, RedisPool};
pub use middleware::{auth_middleware, cors_layer, csrf_middleware, AuthenticatedUser};
pub use repository::{MemorySessionCache, MemoryStore, PgStore, RedisSessionCache, Stores};

use axum::{
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Full router: public auth endpoints, the session-protected API, the CSRF
/// gate over both, then tracing and CORS outermost.
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    let session_check = || axum_middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth = handlers::public_auth_routes()
        .merge(handlers::session_auth_routes().route_layer(session_check()));

    let protected = Router::new()
        .nest("/api/users", handlers::user_routes())
        .nest("/api/transactions", handlers::transaction_routes())
        .nest("/api/points", handlers::points_routes())
        .nest("/api/redemptions", handlers::redemption_routes())
        .nest("/api/events", handlers::event_routes())
        .route_layer(session_check());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth)
        .merge(protected)
        .layer(axum_middleware::from_fn(csrf_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// Library initialization: stores, pools and services from configuration
pub async fn initialize_app_state(
    config: &AppConfig,
) -> Result<AppState, Box<dyn std::error::Error + Send + Sync>> {
    let settings = ServiceSettings::from_config(config);

    if config.features.in_memory_stores {
        info!("Using in-memory stores (environment: {})", config.server.environment);
        return Ok(AppState::in_memory(settings));
    }

    if migrations::should_run_migrations(config) {
        info!("Running embedded migrations...");
        migrations::run_all_migrations(migrations::MigrationConfig::from_config(config)).await?;
    }

    info!("Initializing database pools...");
    let pools = db::create_database_pools().await?;

    info!("Initializing Redis pool...");
    let redis_pool = RedisPool::new(RedisConfig::from_settings(&config.redis)).await?;

    let stores = Stores::postgres(
        PgStore::new(pools.clone()),
        RedisSessionCache::new(redis_pool.clone()),
    );
    Ok(AppState::new(
        stores,
        Backend::Postgres { pools, redis_pool },
        settings,
    ))
}

// Health check handler
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let timestamp = chrono::Utc::now().to_rfc3339();

    let (healthy, components) = match &state.backend {
        Backend::Memory { .. } => (true, serde_json::json!({ "backend": "memory" })),
        Backend::Postgres { pools, redis_pool } => {
            let primary = db::check_diesel_health(&pools.primary).await;
            let replica = db::check_diesel_health(&pools.replica).await;
            let redis = redis_pool.health_check().await;

            let pool_status = |result: &Result<(), Box<dyn std::error::Error + Send + Sync>>| {
                match result {
                    Ok(()) => serde_json::json!({ "status": "healthy", "error": null }),
                    Err(e) => serde_json::json!({
                        "status": "unhealthy",
                        "error": format!("Database connection failed: {}", e)
                    }),
                }
            };

            let healthy = primary.is_ok() && replica.is_ok() && redis.is_healthy;
            (
                healthy,
                serde_json::json!({
                    "backend": "postgres",
                    "postgresql_primary": pool_status(&primary),
                    "postgresql_replica": pool_status(&replica),
                    "redis": {
                        "status": if redis.is_healthy { "healthy" } else { "unhealthy" },
                        "latency_ms": redis.latency_ms,
                        "error": redis.error,
                    }
                }),
            )
        },
    };

    let response = serde_json::json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "service": "loyalty-backend",
        "timestamp": timestamp,
        "pending_events": state.events.in_flight(),
        "components": components,
    });

    if healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Router over fresh in-memory stores with permissive CORS; used by tests and demos
pub fn in_memory_router(settings: ServiceSettings) -> (Router, AppState) {
    let state = AppState::in_memory(settings);
    let router = build_router(state.clone(), cors_layer(&["*".to_string()], false));
    (router, state)
}
