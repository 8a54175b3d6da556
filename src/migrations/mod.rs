// Migration orchestrator
// Embedded in the application binary so deployments need no diesel CLI

pub mod diesel;

use std::error::Error;
use tracing::{error, info};

/// Configuration for migration execution
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub database_url: String,
    pub environment: String,
}

impl MigrationConfig {
    pub fn from_config(config: &crate::app_config::AppConfig) -> Self {
        Self {
            database_url: config.database.primary_url(),
            environment: config.server.environment.to_string(),
        }
    }
}

/// Apply pending schema migrations against the primary
pub async fn run_all_migrations(config: MigrationConfig) -> Result<usize, Box<dyn Error + Send + Sync>> {
    info!(
        "[MIGRATIONS] Starting migration process for environment: {}",
        config.environment
    );

    match diesel::run_migrations(&config.database_url).await {
        Ok(0) => {
            info!("[MIGRATIONS] Schema up to date");
            Ok(0)
        },
        Ok(applied) => {
            info!("[MIGRATIONS] Applied {} migrations", applied);
            Ok(applied)
        },
        Err(e) => {
            error!("[MIGRATIONS] Diesel migration failed: {}", e);
            Err(format!("Diesel migration failed: {}", e).into())
        },
    }
}

/// Migrations run unless explicitly disabled or the stores are in memory
pub fn should_run_migrations(config: &crate::app_config::AppConfig) -> bool {
    !config.features.disable_embedded_migrations && !config.features.in_memory_stores
}
