// Double-submit CSRF check for state-changing requests

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use tracing::warn;

use crate::handlers::cookies::{CSRF_COOKIE, CSRF_HEADER};
use crate::utils::secrets_match;

/// Paths that mint a CSRF token rather than require one
const EXEMPT_PATHS: [&str; 2] = ["/api/auth/login", "/api/auth/register"];

fn is_exempt(method: &Method, path: &str) -> bool {
    method == Method::GET || EXEMPT_PATHS.contains(&path)
}

fn reject(message: &str) -> Response {
    (StatusCode::FORBIDDEN, Json(json!({ "error": message }))).into_response()
}

pub async fn csrf_middleware(jar: CookieJar, request: Request<Body>, next: Next) -> Response {
    if is_exempt(request.method(), request.uri().path()) {
        return next.run(request).await;
    }

    let Some(cookie) = jar.get(CSRF_COOKIE).map(|c| c.value().to_string()) else {
        warn!(path = %request.uri().path(), "CSRF cookie missing");
        return reject("CSRF cookie not found");
    };

    let Some(header) = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(String::from)
    else {
        warn!(path = %request.uri().path(), "CSRF header missing");
        return reject("CSRF token missing in headers");
    };

    if cookie.is_empty() || !secrets_match(&cookie, &header) {
        warn!(path = %request.uri().path(), "CSRF token mismatch");
        return reject("CSRF token mismatch");
    }

    next.run(request).await
}
