use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// Errors surfaced by every store contract, whatever the backend
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("insufficient points: available {available}, requested {requested}")]
    InsufficientPoints { available: i64, requested: i64 },

    #[error("reward is not available")]
    RewardUnavailable,

    #[error("merchant limit of {limit} reached")]
    MerchantLimitReached { limit: i64 },

    #[error("Database error: {0}")]
    Database(DieselError),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        StoreError::NotFound(what.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<DieselError> for StoreError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::NotFound => StoreError::NotFound("record".to_string()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                let what = info.constraint_name().unwrap_or("unique constraint").to_string();
                StoreError::Conflict(format!("duplicate value violates {}", what))
            },
            other => StoreError::Database(other),
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Cache(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Cache(format!("session encoding: {}", e))
    }
}
