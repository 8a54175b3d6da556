// Utility modules for the loyalty backend

pub mod audit_logger;
pub mod auth_errors;
pub mod password;
pub mod service_error;
pub mod tokens;
pub mod validation;

pub use audit_logger::{AuditAction, AuditLogger};
pub use auth_errors::{log_auth_failure, AuthError};
pub use password::{
    hash_password_with_config, needs_rehash, verify_password, PasswordConfig, PasswordError,
};
pub use service_error::{BusinessCode, ServiceError};
pub use tokens::{generate_csrf_token, generate_otp, generate_session_token, secrets_match};
pub use validation::normalize_email;
