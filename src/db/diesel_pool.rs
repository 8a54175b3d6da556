// Diesel Database Pool Configuration
// Diesel-async + bb8 connection pooling for the primary and the read replica

use bb8::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations};
use std::time::Duration;

// Embed migrations at compile time
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/diesel");

pub type DieselPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Which side of the replication pair a pool talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolRole {
    Primary,
    Replica,
}

impl std::fmt::Display for PoolRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolRole::Primary => write!(f, "primary"),
            PoolRole::Replica => write!(f, "replica"),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DieselDatabaseConfig {
    pub role: PoolRole,
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
    pub test_on_checkout: bool,
}

impl DieselDatabaseConfig {
    fn from_settings(role: PoolRole, settings: &crate::app_config::DatabaseConfig) -> Self {
        let url = match role {
            PoolRole::Primary => settings.primary_url(),
            PoolRole::Replica => settings.replica_url(),
        };

        Self {
            role,
            url,
            max_connections: settings.max_connections,
            min_connections: settings.min_connections,
            connection_timeout: Duration::from_secs(settings.connect_timeout),
            idle_timeout: Duration::from_secs(settings.idle_timeout),
            max_lifetime: Duration::from_secs(settings.max_lifetime),
            test_on_checkout: true,
        }
    }

    pub fn primary() -> Self {
        Self::from_settings(PoolRole::Primary, &crate::app_config::config().database)
    }

    pub fn replica() -> Self {
        Self::from_settings(PoolRole::Replica, &crate::app_config::config().database)
    }
}

/// Both pools; reads that tolerate replica lag go to `replica`
#[derive(Clone)]
pub struct DatabasePools {
    pub primary: DieselPool,
    pub replica: DieselPool,
}

/// Create Diesel connection pool
pub async fn create_diesel_pool(
    config: DieselDatabaseConfig,
) -> Result<DieselPool, Box<dyn std::error::Error + Send + Sync>> {
    tracing::info!(
        "Connecting {} pool to {}",
        config.role,
        mask_connection_string(&config.url)
    );

    // Create connection manager
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(config.url.clone());

    // Configure bb8 pool
    let pool = Pool::builder()
        .max_size(config.max_connections)
        .min_idle(Some(config.min_connections))
        .connection_timeout(config.connection_timeout)
        .idle_timeout(Some(config.idle_timeout))
        .max_lifetime(Some(config.max_lifetime))
        .test_on_check_out(config.test_on_checkout)
        .build(manager)
        .await?;

    // Test the connection
    let conn = pool.get().await?;
    drop(conn);

    tracing::info!(
        "Diesel {} pool initialized with {} max connections",
        config.role,
        config.max_connections
    );

    Ok(pool)
}

/// Create the primary and replica pools
pub async fn create_database_pools() -> Result<DatabasePools, Box<dyn std::error::Error + Send + Sync>>
{
    let primary = create_diesel_pool(DieselDatabaseConfig::primary()).await?;
    let replica = create_diesel_pool(DieselDatabaseConfig::replica()).await?;
    Ok(DatabasePools { primary, replica })
}

/// Health check for database pool
pub async fn check_diesel_health(pool: &DieselPool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let conn = pool.get().await?;

    // Simple health check - just getting a connection is enough
    drop(conn);

    Ok(())
}

/// Mask database connection string for logging
pub fn mask_connection_string(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        let scheme = parsed.scheme();
        let host = parsed.host_str().unwrap_or("***");
        let path = parsed.path();
        let port = parsed
            .port()
            .map(|p| format!(":{}", p))
            .unwrap_or_default();

        // Always normalize to postgresql:// prefix
        let normalized_scheme = if scheme == "postgres" {
            "postgresql"
        } else {
            scheme
        };

        if parsed.username().is_empty() && parsed.password().is_none() {
            format!("{}://{}{}{}", normalized_scheme, host, port, path)
        } else {
            format!("{}://***:***@{}{}{}", normalized_scheme, host, port, path)
        }
    } else {
        "postgresql://***:***@***".to_string()
    }
}
