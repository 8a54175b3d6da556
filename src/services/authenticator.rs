// Per-request session check: the cache first, the credential store on a miss

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::Session;
use crate::repository::{CredentialStore, SessionCache, StoreError};
use crate::utils::tokens::{is_well_formed_session_token, secrets_match};
use crate::utils::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    Cache,
    Store,
}

#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub source: SessionSource,
}

#[derive(Clone)]
pub struct SessionAuthenticator {
    credentials: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionCache>,
}

impl SessionAuthenticator {
    pub fn new(credentials: Arc<dyn CredentialStore>, sessions: Arc<dyn SessionCache>) -> Self {
        Self {
            credentials,
            sessions,
        }
    }

    pub async fn authenticate(
        &self,
        token: &str,
        user_id: Uuid,
    ) -> Result<AuthenticatedSession, AuthError> {
        if !is_well_formed_session_token(token) {
            return Err(AuthError::MissingToken);
        }
        let now = Utc::now();

        match self.sessions.get(user_id).await {
            Ok(Some(cached)) => {
                if cached.user_id != user_id {
                    return Err(AuthError::UserIdMismatch);
                }
                if secrets_match(token, &cached.token_hash) && !cached.is_expired_at(now) {
                    return Ok(AuthenticatedSession {
                        user_id,
                        token: token.to_string(),
                        expires_at: cached.expires_at,
                        source: SessionSource::Cache,
                    });
                }
                // Stale snapshot; the credential store decides
                debug!(%user_id, "Cached session disagrees with presented token");
                if let Err(e) = self.sessions.delete(user_id).await {
                    warn!(%user_id, "Failed to drop stale session: {}", e);
                }
            },
            Ok(None) => {},
            Err(e) => warn!(%user_id, "Session cache unavailable: {}", e),
        }

        let stored = match self.credentials.get_token_by_hash(token).await {
            Ok(t) => t,
            Err(StoreError::NotFound(_)) => return Err(AuthError::InvalidToken),
            Err(e) => return Err(e.into()),
        };
        if stored.is_expired_at(now) {
            return Err(AuthError::InvalidToken);
        }
        if stored.user_id != user_id {
            return Err(AuthError::UserIdMismatch);
        }

        if let Err(e) = self.credentials.touch_token(stored.id).await {
            warn!(%user_id, "Failed to touch token: {}", e);
        }

        let session = Session {
            user_id,
            token_hash: stored.token_hash.clone(),
            expires_at: stored.expires_at,
        };
        if let Err(e) = self.sessions.store(&session).await {
            warn!(%user_id, "Failed to repopulate session cache: {}", e);
        }

        Ok(AuthenticatedSession {
            user_id,
            token: stored.token_hash,
            expires_at: stored.expires_at,
            source: SessionSource::Store,
        })
    }
}
