// Session, identity and CSRF cookies

use axum::http::{HeaderMap, HeaderValue};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;
use uuid::Uuid;

use crate::utils::generate_csrf_token;

pub const SESSION_COOKIE: &str = "session_token";
pub const USER_ID_COOKIE: &str = "user_id";
pub const USER_NAME_COOKIE: &str = "user_name";
pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";
pub const USER_ID_HEADER: &str = "x-user-id";

/// Cookie attributes shared by every cookie the API sets
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub secure: bool,
    pub max_age_seconds: i64,
}

impl CookiePolicy {
    fn build(&self, name: &'static str, value: String, http_only: bool) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(http_only)
            .secure(self.secure)
            .same_site(SameSite::Strict)
            .max_age(Duration::seconds(self.max_age_seconds))
            .build()
    }

    pub fn session_cookie(&self, token: &str) -> Cookie<'static> {
        self.build(SESSION_COOKIE, token.to_string(), true)
    }

    /// Readable by client scripts
    pub fn user_id_cookie(&self, user_id: Uuid) -> Cookie<'static> {
        self.build(USER_ID_COOKIE, user_id.to_string(), false)
    }

    pub fn user_name_cookie(&self, name: &str) -> Cookie<'static> {
        self.build(USER_NAME_COOKIE, name.to_string(), false)
    }

    pub fn csrf_cookie(&self, token: &str) -> Cookie<'static> {
        self.build(CSRF_COOKIE, token.to_string(), false)
    }

    /// Issue a fresh CSRF token as cookie plus response header
    pub fn with_csrf(&self, jar: CookieJar, headers: &mut HeaderMap) -> CookieJar {
        let token = generate_csrf_token();
        if let Ok(value) = HeaderValue::from_str(&token) {
            headers.insert(CSRF_HEADER, value);
        }
        jar.add(self.csrf_cookie(&token))
    }

    /// Expire every cookie the API ever sets
    pub fn cleared(&self, jar: CookieJar) -> CookieJar {
        [SESSION_COOKIE, USER_ID_COOKIE, USER_NAME_COOKIE, CSRF_COOKIE]
            .into_iter()
            .fold(jar, |jar, name| {
                jar.add(
                    Cookie::build((name, ""))
                        .path("/")
                        .secure(self.secure)
                        .max_age(Duration::seconds(-1))
                        .build(),
                )
            })
    }
}
