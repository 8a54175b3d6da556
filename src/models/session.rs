use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pattern matching every cached session key
pub const SESSION_KEY_PATTERN: &str = "session:*";

/// Cached view of a user's active bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn cache_key(user_id: Uuid) -> String {
        format!("session:userid:{}", user_id)
    }

    /// Remaining lifetime in whole seconds; None once expired
    pub fn ttl_seconds(&self, now: DateTime<Utc>) -> Option<u64> {
        let remaining = (self.expires_at - now).num_seconds();
        if remaining > 0 {
            Some(remaining as u64)
        } else {
            None
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Swap in a new token valid for `ttl` from `now`; returns the cache TTL in seconds
    pub fn rotate(&mut self, new_token: &str, ttl: Duration, now: DateTime<Utc>) -> Option<u64> {
        self.token_hash = new_token.to_string();
        self.expires_at = now + ttl;
        self.ttl_seconds(now)
    }
}
