// Audit trail for authentication events, written as JSON lines under target "audit"
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    UserRegistered,
    VerificationResent,
    EmailVerified,
    LoginSucceeded,
    LoginFailed,
    AccountLocked,
    LoggedOut,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub action: AuditAction,
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl AuditLog {
    pub fn new(
        action: AuditAction,
        user_id: Option<Uuid>,
        email: Option<&str>,
        details: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            user_id,
            email: email.map(String::from),
            details,
            timestamp: Utc::now(),
        }
    }
}

pub struct AuditLogger;

impl AuditLogger {
    /// Log an authentication event
    pub fn log_auth_event(
        action: AuditAction,
        user_id: Option<Uuid>,
        email: Option<&str>,
        details: Option<serde_json::Value>,
    ) {
        let audit_log = AuditLog::new(action, user_id, email, details);

        let json_log = serde_json::to_string(&audit_log).unwrap_or_else(|e| {
            warn!("Failed to serialize audit log: {}", e);
            format!("{:?}", audit_log)
        });

        info!(target: "audit", "{}", json_log);
    }
}
