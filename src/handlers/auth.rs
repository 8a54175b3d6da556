// Authentication handlers: registration, OTP verification, login, logout

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    app::AppState,
    handlers::ApiResponse,
    middleware::auth::AuthenticatedUser,
    models::{User, UserStatus},
    services::{
        auth::{LoginRequest, RegisterRequest, ResendVerificationRequest, VerifyRequest},
        IssuedVerification,
    },
    utils::ServiceError,
};

// =============================================================================
// RESPONSE TYPES
// =============================================================================

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub email: String,
    pub status: UserStatus,
    pub verification_expires_at: DateTime<Utc>,
}

impl From<IssuedVerification> for RegisterResponse {
    fn from(issued: IssuedVerification) -> Self {
        Self {
            user_id: issued.user.id,
            email: issued.user.email,
            status: issued.user.status,
            verification_expires_at: issued.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: Uuid,
    pub user_name: String,
    pub expires_at: DateTime<Utc>,
}

// =============================================================================
// HANDLERS
// =============================================================================

/// POST /api/auth/register
/// Creates a pending user and issues an OTP. Also hands out a CSRF token so the
/// client can call /verify.
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let Json(req) = payload?;
    let issued = state.auth_service.register(req).await?;

    let mut headers = HeaderMap::new();
    let jar = state.cookies.with_csrf(jar, &mut headers);

    Ok((
        StatusCode::CREATED,
        jar,
        headers,
        ApiResponse::ok(
            RegisterResponse::from(issued),
            "Registration successful. Check your inbox for the verification code.",
        ),
    )
        .into_response())
}

/// POST /api/auth/verify
pub async fn verify(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<User>>, ServiceError> {
    let Json(req) = payload?;
    let user = state.auth_service.verify(req).await?;
    Ok(ApiResponse::ok(user, "Account verified"))
}

/// POST /api/auth/resend-verification
pub async fn resend_verification(
    State(state): State<AppState>,
    payload: Result<Json<ResendVerificationRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<RegisterResponse>>, ServiceError> {
    let Json(req) = payload?;
    let issued = state.auth_service.resend_verification(req).await?;
    Ok(ApiResponse::ok(
        RegisterResponse::from(issued),
        "Verification code sent",
    ))
}

/// POST /api/auth/login
/// Sets session_token, user_id, user_name and csrf_token cookies; the CSRF token
/// is echoed in the X-CSRF-Token header.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let Json(req) = payload?;
    let outcome = state.auth_service.login(req).await?;

    let cookies = state.cookies;
    let mut headers = HeaderMap::new();
    let jar = jar
        .add(cookies.session_cookie(&outcome.token))
        .add(cookies.user_id_cookie(outcome.user.id))
        .add(cookies.user_name_cookie(&outcome.user.name));
    let jar = cookies.with_csrf(jar, &mut headers);

    let body = LoginResponse {
        token: outcome.token,
        user_id: outcome.user.id,
        user_name: outcome.user.name,
        expires_at: outcome.expires_at,
    };

    Ok((jar, headers, ApiResponse::ok(body, "Login successful")).into_response())
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    user: AuthenticatedUser,
) -> Result<Response, ServiceError> {
    state.auth_service.logout(user.user_id).await?;
    let jar = state.cookies.cleared(jar);
    Ok((jar, ApiResponse::message("Logged out")).into_response())
}
