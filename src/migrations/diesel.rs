// Diesel migration runner for PostgreSQL
// diesel_migrations needs a sync connection, so the work runs on the blocking pool

use crate::db::diesel_pool::MIGRATIONS;
use diesel::Connection;
use diesel::PgConnection;
use diesel_migrations::MigrationHarness;
use std::error::Error;
use tracing::{debug, info};

/// Run all pending migrations, returning how many were applied
pub async fn run_migrations(database_url: &str) -> Result<usize, Box<dyn Error + Send + Sync>> {
    let database_url = database_url.to_string();

    tokio::task::spawn_blocking(move || -> Result<usize, Box<dyn Error + Send + Sync>> {
        let mut conn = PgConnection::establish(&database_url)
            .map_err(|e| format!("Failed to establish sync connection: {}", e))?;

        let pending = conn
            .pending_migrations(MIGRATIONS)
            .map_err(|e| format!("Failed to check pending migrations: {}", e))?;
        if pending.is_empty() {
            debug!("[DIESEL] No pending migrations found");
            return Ok(0);
        }
        info!("[DIESEL] Found {} pending migrations", pending.len());

        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| format!("Failed to run migrations: {}", e))?;
        for migration in &applied {
            debug!("[DIESEL] Applied migration: {}", migration);
        }
        Ok(applied.len())
    })
    .await
    .map_err(|e| format!("Migration task panicked: {}", e))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::migration::MigrationSource;
    use diesel::pg::Pg;

    #[test]
    fn test_schema_migration_is_embedded() {
        let migrations = MigrationSource::<Pg>::migrations(&MIGRATIONS).unwrap();
        assert!(migrations
            .iter()
            .any(|m| m.name().to_string().contains("create_loyalty_schema")));
    }
}
