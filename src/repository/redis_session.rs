// Redis-backed session cache
// Key layout `session:userid:{user_id}`, value is the JSON session, TTL from expires_at

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use super::{SessionCache, StoreError, StoreResult};
use crate::db::RedisPool;
use crate::models::session::SESSION_KEY_PATTERN;
use crate::models::Session;

#[derive(Clone)]
pub struct RedisSessionCache {
    pool: RedisPool,
}

impl RedisSessionCache {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &RedisPool {
        &self.pool
    }
}

#[async_trait]
impl SessionCache for RedisSessionCache {
    async fn store(&self, session: &Session) -> StoreResult<()> {
        let ttl = session
            .ttl_seconds(Utc::now())
            .ok_or_else(|| StoreError::Validation("session already expired".to_string()))?;
        let payload = serde_json::to_string(session)?;

        self.pool
            .set_with_expiry(&Session::cache_key(session.user_id), payload, ttl)
            .await?;
        Ok(())
    }

    async fn get(&self, user_id: Uuid) -> StoreResult<Option<Session>> {
        let raw = self.pool.get_string(&Session::cache_key(user_id)).await?;

        match raw {
            Some(payload) => match serde_json::from_str::<Session>(&payload) {
                Ok(session) => Ok(Some(session)),
                Err(e) => {
                    // Undecodable snapshots count as a miss
                    debug!("Dropping unreadable session for {}: {}", user_id, e);
                    Ok(None)
                },
            },
            None => Ok(None),
        }
    }

    async fn delete(&self, user_id: Uuid) -> StoreResult<()> {
        self.pool.del(&Session::cache_key(user_id)).await?;
        Ok(())
    }

    async fn refresh(&self, user_id: Uuid, new_token: &str, ttl: Duration) -> StoreResult<Session> {
        let mut session = self
            .get(user_id)
            .await?
            .ok_or_else(|| StoreError::not_found("session"))?;

        // Same key per user, so SETEX overwrites the old snapshot
        let seconds = session
            .rotate(new_token, ttl, Utc::now())
            .ok_or_else(|| StoreError::Validation("refresh ttl must be positive".to_string()))?;

        let payload = serde_json::to_string(&session)?;
        self.pool
            .set_with_expiry(&Session::cache_key(user_id), payload, seconds)
            .await?;
        Ok(session)
    }

    async fn delete_all(&self) -> StoreResult<usize> {
        let removed = self.pool.delete_matching(SESSION_KEY_PATTERN).await?;
        Ok(removed)
    }
}
