// Random secrets: OTP codes, session tokens, CSRF tokens

use base64::Engine;
use rand::{rngs::OsRng, Rng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub const OTP_LENGTH: usize = 6;
pub const SESSION_TOKEN_BYTES: usize = 32;
pub const CSRF_TOKEN_BYTES: usize = 32;

/// 6-digit numeric code from the OS RNG; leading zeros are kept
pub fn generate_otp() -> String {
    let code: u32 = OsRng.gen_range(0..1_000_000);
    format!("{:0width$}", code, width = OTP_LENGTH)
}

/// 256-bit random value, lowercase hex
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// 256-bit random value, base64url without padding
pub fn generate_csrf_token() -> String {
    let mut bytes = [0u8; CSRF_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Constant-time equality for presented secrets
pub fn secrets_match(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Short SHA-256 prefix safe to put in logs
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().take(6).map(|b| format!("{:02x}", b)).collect()
}

/// Session tokens are exactly 64 lowercase hex characters
pub fn is_well_formed_session_token(token: &str) -> bool {
    token.len() == SESSION_TOKEN_BYTES * 2
        && token.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
