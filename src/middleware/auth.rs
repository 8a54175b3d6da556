// Identity attached to a request once its session checks out

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::services::AuthenticatedSession;

#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    #[serde(skip)]
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl From<AuthenticatedSession> for AuthenticatedUser {
    fn from(session: AuthenticatedSession) -> Self {
        Self {
            user_id: session.user_id,
            token: session.token,
            expires_at: session.expires_at,
        }
    }
}
