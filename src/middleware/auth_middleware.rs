// Authentication middleware for protected routes
// Validates the session token and injects AuthenticatedUser into request extensions

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    app::AppState,
    handlers::cookies::{SESSION_COOKIE, USER_ID_COOKIE, USER_ID_HEADER},
    middleware::auth::AuthenticatedUser,
    utils::{AuthError, ServiceError},
};

/// Session cookie first, then `Authorization: Bearer`
fn extract_token(jar: &CookieJar, headers: &HeaderMap) -> Result<String, AuthError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Ok(cookie.value().to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .ok_or(AuthError::MissingToken)
}

/// `X-User-Id` header first, then the `user_id` cookie
fn extract_user_id(jar: &CookieJar, headers: &HeaderMap) -> Result<Uuid, AuthError> {
    let raw = headers
        .get(USER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(String::from)
        .or_else(|| jar.get(USER_ID_COOKIE).map(|c| c.value().to_string()))
        .ok_or(AuthError::MissingUserId)?;

    Uuid::parse_str(raw.trim()).map_err(|_| AuthError::MissingUserId)
}

/// Middleware function that validates the session and adds AuthenticatedUser to extensions.
/// Successful requests get their session cookies refreshed.
pub async fn auth_middleware(
    State(app_state): State<AppState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let presented = extract_token(&jar, request.headers())
        .and_then(|token| Ok((token, extract_user_id(&jar, request.headers())?)));

    let (token, user_id) = match presented {
        Ok(pair) => pair,
        Err(e) => {
            warn!(path = %request.uri().path(), "Rejected request: {}", e);
            return ServiceError::from(e).into_response();
        },
    };

    let session = match app_state.authenticator.authenticate(&token, user_id).await {
        Ok(session) => session,
        Err(e) => {
            warn!(%user_id, error_code = e.error_code(), "Session validation failed");
            return ServiceError::from(e).into_response();
        },
    };

    debug!(%user_id, source = ?session.source, "Session authenticated");
    let auth_user = AuthenticatedUser::from(session);
    let cookies = app_state.cookies;
    let refreshed = CookieJar::new()
        .add(cookies.session_cookie(&auth_user.token))
        .add(cookies.user_id_cookie(auth_user.user_id));

    request.extensions_mut().insert(auth_user);
    let response = next.run(request).await;

    // Logout clears the session cookie itself
    if sets_cookie(response.headers(), SESSION_COOKIE) {
        return response;
    }
    (refreshed, response).into_response()
}

fn sets_cookie(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.strip_prefix(name).is_some_and(|rest| rest.starts_with('=')))
}

/// Extractor for AuthenticatedUser from request extensions
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ServiceError::Unauthorized("Authentication required".to_string()))
    }
}
