// HTTP-facing error taxonomy
// Body shape is {"error": <message>, "details": <object, optional>}
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::AmountError;
use crate::repository::StoreError;
use crate::utils::auth_errors::AuthError;

/// Domain rule violations surfaced as 422 with `details.code`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusinessCode {
    InsufficientPoints,
    RewardInactive,
    MaxMerchantsExceeded,
}

impl BusinessCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessCode::InsufficientPoints => "INSUFFICIENT_POINTS",
            BusinessCode::RewardInactive => "REWARD_INACTIVE",
            BusinessCode::MaxMerchantsExceeded => "MAX_MERCHANTS_EXCEEDED",
        }
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("account temporarily locked until {}", .locked_until.to_rfc3339())]
    AccountLocked { locked_until: DateTime<Utc> },

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    Business {
        code: BusinessCode,
        message: String,
        extra: Option<Value>,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn business(code: BusinessCode, message: impl Into<String>) -> Self {
        ServiceError::Business {
            code,
            message: message.into(),
            extra: None,
        }
    }

    pub fn is_business(&self, code: BusinessCode) -> bool {
        matches!(self, ServiceError::Business { code: c, .. } if *c == code)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized(_) | ServiceError::AccountLocked { .. } => {
                StatusCode::UNAUTHORIZED
            },
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Business { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Database(_) | ServiceError::Cache(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            ServiceError::AccountLocked { locked_until } => Some(json!({
                "code": "ACCOUNT_LOCKED",
                "locked_until": locked_until.to_rfc3339(),
            })),
            ServiceError::Business { code, extra, .. } => {
                let mut details = json!({ "code": code.as_str() });
                if let (Some(Value::Object(fields)), Value::Object(target)) =
                    (extra.clone(), &mut details)
                {
                    target.extend(fields);
                }
                Some(details)
            },
            _ => None,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if status.is_server_error() {
            // Underlying failures are logged, never echoed
            tracing::error!(error = %self, "Request failed with a system error");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = match self.details() {
            Some(details) => json!({ "error": message, "details": details }),
            None => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            e @ StoreError::NotFound(_) => ServiceError::NotFound(e.to_string()),
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            StoreError::Validation(msg) => ServiceError::Validation(msg),
            e @ StoreError::InsufficientPoints {
                available,
                requested,
            } => ServiceError::Business {
                code: BusinessCode::InsufficientPoints,
                message: e.to_string(),
                extra: Some(json!({ "available": available, "requested": requested })),
            },
            StoreError::RewardUnavailable => ServiceError::business(
                BusinessCode::RewardInactive,
                "reward is inactive or out of stock",
            ),
            e @ StoreError::MerchantLimitReached { limit } => ServiceError::Business {
                code: BusinessCode::MaxMerchantsExceeded,
                message: e.to_string(),
                extra: Some(json!({ "limit": limit })),
            },
            StoreError::Database(e) => ServiceError::Database(e.to_string()),
            StoreError::Pool(msg) => ServiceError::Database(msg),
            StoreError::Cache(msg) => ServiceError::Cache(msg),
        }
    }
}

impl From<AuthError> for ServiceError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::AccountLocked { locked_until } => {
                ServiceError::AccountLocked { locked_until }
            },
            AuthError::Store(e) => e.into(),
            AuthError::Password(e) => ServiceError::Internal(e.to_string()),
            other => {
                let message = other.to_string();
                match other.status_code() {
                    StatusCode::UNAUTHORIZED => ServiceError::Unauthorized(message),
                    StatusCode::CONFLICT => ServiceError::Conflict(message),
                    StatusCode::NOT_FOUND => ServiceError::NotFound(message),
                    StatusCode::BAD_REQUEST => ServiceError::Validation(message),
                    _ => ServiceError::Internal(message),
                }
            },
        }
    }
}

impl From<diesel::result::Error> for ServiceError {
    fn from(error: diesel::result::Error) -> Self {
        StoreError::from(error).into()
    }
}

impl From<redis::RedisError> for ServiceError {
    fn from(error: redis::RedisError) -> Self {
        ServiceError::Cache(error.to_string())
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(error: validator::ValidationErrors) -> Self {
        ServiceError::Validation(error.to_string())
    }
}

impl From<AmountError> for ServiceError {
    fn from(error: AmountError) -> Self {
        ServiceError::Validation(error.to_string())
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ServiceError {
    fn from(rejection: PathRejection) -> Self {
        ServiceError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ServiceError {
    fn from(rejection: QueryRejection) -> Self {
        ServiceError::Validation(rejection.body_text())
    }
}
