// Double-submit CSRF enforcement across the API

use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;
use common::{unique_email, TestApp, PASSWORD};

#[tokio::test]
async fn test_state_changing_request_requires_matching_tokens() {
    let app = TestApp::new();
    let session = app.signed_in_user(&unique_email("csrf")).await;
    let uri = "/api/auth/logout";

    let response = app
        .post(uri)
        .cookie("session_token", &session.token)
        .cookie("user_id", &session.user_id.to_string())
        .header("x-csrf-token", &session.csrf)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await;
    assert_eq!(body["error"], "CSRF cookie not found");

    let response = app
        .post(uri)
        .cookie("session_token", &session.token)
        .cookie("user_id", &session.user_id.to_string())
        .cookie("csrf_token", &session.csrf)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await;
    assert_eq!(body["error"], "CSRF token missing in headers");

    let response = app
        .post(uri)
        .cookie("session_token", &session.token)
        .cookie("user_id", &session.user_id.to_string())
        .cookie("csrf_token", &session.csrf)
        .header("x-csrf-token", "forged")
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: Value = response.json().await;
    assert_eq!(body["error"], "CSRF token mismatch");

    // The session survived all three attempts
    let response = app.get("/api/users/me").session(&session).send().await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_csrf_is_checked_before_authentication() {
    let app = TestApp::new();
    let response = app
        .post("/api/transactions")
        .json(&json!({}))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post("/api/transactions")
        .csrf("abc")
        .json(&json!({}))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_exempt_routes() {
    let app = TestApp::new();

    // Reads never need a token
    let response = app.get("/health").send().await;
    assert_eq!(response.status(), StatusCode::OK);

    // Login and register mint the token
    let email = unique_email("exempt");
    let (user_id, _) = app.register(&email, PASSWORD).await;
    let response = app.login(&email, PASSWORD).await;
    assert_ne!(response.status(), StatusCode::FORBIDDEN);

    // Verify is not exempt
    let otp = app.latest_otp(user_id).await;
    let response = app
        .post("/api/auth/verify")
        .json(&json!({ "email": email, "otp": otp }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
