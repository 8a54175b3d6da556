// Postgres-backed stores
// Writes and strongly-consistent reads use the primary pool; list queries that
// tolerate replica lag use the replica pool.

mod catalog;
mod credentials;
mod events;
mod ledger;
mod redemptions;
mod transactions;

use bb8::PooledConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;

use super::StoreError;
use crate::db::{DatabasePools, DieselPool};

pub(crate) type PgConn<'a> = PooledConnection<'a, AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Every store contract over one pair of diesel pools
#[derive(Clone)]
pub struct PgStore {
    pools: DatabasePools,
}

impl PgStore {
    pub fn new(pools: DatabasePools) -> Self {
        Self { pools }
    }

    pub fn pools(&self) -> &DatabasePools {
        &self.pools
    }

    pub(crate) async fn primary(&self) -> Result<PgConn<'_>, StoreError> {
        checkout(&self.pools.primary).await
    }

    pub(crate) async fn replica(&self) -> Result<PgConn<'_>, StoreError> {
        checkout(&self.pools.replica).await
    }
}

async fn checkout(pool: &DieselPool) -> Result<PgConn<'_>, StoreError> {
    pool.get().await.map_err(|e| {
        tracing::error!("Failed to get database connection: {}", e);
        StoreError::Pool(e.to_string())
    })
}
