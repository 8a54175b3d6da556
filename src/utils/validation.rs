// Validation helpers shared by request types

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 128;
pub const PHONE_MAX_LEN: usize = 32;

lazy_static! {
    static ref PHONE_RE: Regex = Regex::new(r"^\+?[0-9][0-9 ()\-]*$").expect("valid phone regex");
}

/// Lowercased, trimmed email used as the lookup key everywhere
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Non-empty, contains `@` and `.`, with non-empty local and domain parts
pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || !email.contains('.') {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty(),
        None => false,
    }
}

pub fn validate_email_address(email: &str) -> Result<(), ValidationError> {
    if is_valid_email(email.trim()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("email");
        err.message = Some("Invalid email format".into());
        Err(err)
    }
}

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let phone = phone.trim();
    if phone.is_empty() || phone.len() > PHONE_MAX_LEN || !PHONE_RE.is_match(phone) {
        let mut err = ValidationError::new("phone");
        err.message = Some("Phone must be 1-32 characters of digits, spaces or dashes".into());
        return Err(err);
    }
    Ok(())
}
