// Integration tests for registration, verification, login and logout

use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;
use common::{unique_email, TestApp, PASSWORD};

#[tokio::test]
async fn test_register_verify_login_end_to_end() {
    let app = TestApp::new();

    let response = app
        .post("/api/auth/register")
        .json(&json!({
            "email": "a@b.co",
            "password": "hunter22",
            "name": "A",
            "phone": "+1"
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(response.header("x-csrf-token").is_some());
    let csrf = response.cookie("csrf_token").unwrap();
    let body: Value = response.json().await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "pending");
    let user_id: uuid::Uuid = body["data"]["user_id"].as_str().unwrap().parse().unwrap();

    let otp = app.latest_otp(user_id).await;
    assert_eq!(otp.len(), 6);
    assert!(otp.chars().all(|c| c.is_ascii_digit()));

    let response = app.verify("a@b.co", &otp, &csrf).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await;
    assert_eq!(body["data"]["status"], "active");
    assert!(body["data"].get("password_hash").is_none());

    let response = app.login("a@b.co", "hunter22").await;
    assert_eq!(response.status(), StatusCode::OK);

    let session_line = response.set_cookie_line("session_token").unwrap();
    assert!(session_line.contains("HttpOnly"));
    assert!(session_line.contains("SameSite=Strict"));
    assert!(session_line.contains("Max-Age=86400"));
    assert!(!response.set_cookie_line("user_id").unwrap().contains("HttpOnly"));
    assert_eq!(response.cookie("user_name").as_deref(), Some("A"));
    assert_eq!(
        response.cookie("csrf_token"),
        response.header("x-csrf-token")
    );

    let token = response.cookie("session_token").unwrap();
    let body: Value = response.json().await;
    assert_eq!(body["data"]["token"], token.as_str());
    assert_eq!(body["data"]["user_id"], user_id.to_string());
    assert_eq!(body["data"]["user_name"], "A");
    assert_eq!(token.len(), 64);

    let cached = app.state.stores.sessions.get(user_id).await.unwrap().unwrap();
    assert_eq!(cached.token_hash, token);
}

#[tokio::test]
async fn test_register_rejects_bad_input_and_duplicates() {
    let app = TestApp::new();

    for (email, password) in [("no-at-sign.co", PASSWORD), ("x@y.co", "short")] {
        let response = app
            .post("/api/auth/register")
            .json(&json!({ "email": email, "password": password, "name": "A", "phone": "+2" }))
            .send()
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", email);
    }

    let email = unique_email("dup");
    app.register(&email, PASSWORD).await;
    let response = app
        .post("/api/auth/register")
        .json(&json!({ "email": email, "password": PASSWORD, "name": "B", "phone": "+3" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_malformed_json_is_a_validation_error() {
    let app = TestApp::new();
    let response = app
        .post("/api/auth/login")
        .header("content-type", "application/json")
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_verification_is_single_use() {
    let app = TestApp::new();
    let email = unique_email("otp");
    let (user_id, csrf) = app.register(&email, PASSWORD).await;
    let otp = app.latest_otp(user_id).await;

    let wrong = if otp == "000000" { "111111" } else { "000000" };
    assert_eq!(
        app.verify(&email, wrong, &csrf).await.status(),
        StatusCode::BAD_REQUEST
    );

    assert_eq!(app.verify(&email, &otp, &csrf).await.status(), StatusCode::OK);
    assert_eq!(
        app.verify(&email, &otp, &csrf).await.status(),
        StatusCode::CONFLICT
    );
}

#[tokio::test]
async fn test_expired_verification_is_rejected() {
    let app = TestApp::new();
    let email = unique_email("late");
    let (user_id, csrf) = app.register(&email, PASSWORD).await;
    let otp = app.latest_otp(user_id).await;

    app.state
        .memory_store()
        .unwrap()
        .backdate_verifications(user_id, chrono::Duration::hours(25))
        .await;

    let response = app.verify(&email, &otp, &csrf).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await;
    assert_eq!(body["error"], "verification code expired");
}

#[tokio::test]
async fn test_resend_verification_cooldown() {
    let app = TestApp::new();
    let email = unique_email("resend");
    let (user_id, csrf) = app.register(&email, PASSWORD).await;
    let first = app.latest_otp(user_id).await;

    let response = app
        .post("/api/auth/resend-verification")
        .csrf(&csrf)
        .json(&json!({ "email": email }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.state
        .memory_store()
        .unwrap()
        .backdate_verifications(user_id, chrono::Duration::seconds(61))
        .await;

    let response = app
        .post("/api/auth/resend-verification")
        .csrf(&csrf)
        .json(&json!({ "email": email }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let latest = app
        .state
        .stores
        .credentials
        .latest_verification(user_id)
        .await
        .unwrap()
        .unwrap();
    assert!(latest.created_at > chrono::Utc::now() - chrono::Duration::seconds(60));
    let second = latest.otp;
    assert_eq!(first.len(), second.len());

    assert_eq!(app.verify(&email, &second, &csrf).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = TestApp::new();
    let email = unique_email("enum");
    app.signed_in_user(&email).await;

    let unknown = app.login(&unique_email("ghost"), PASSWORD).await;
    let wrong = app.login(&email, "not-the-password").await;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let unknown: Value = unknown.json().await;
    let wrong: Value = wrong.json().await;
    assert_eq!(unknown["error"], "invalid credentials");
    assert_eq!(unknown, wrong);
}

#[tokio::test]
async fn test_unverified_account_cannot_log_in() {
    let app = TestApp::new();
    let email = unique_email("pending");
    app.register(&email, PASSWORD).await;

    let response = app.login(&email, PASSWORD).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await;
    assert_eq!(body["error"], "account not verified");
}

#[tokio::test]
async fn test_lockout_after_five_failures_then_recovery() {
    let app = TestApp::new();
    let email = unique_email("lock");
    app.signed_in_user(&email).await;

    for _ in 0..5 {
        let response = app.login(&email, "wrong-password").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: Value = response.json().await;
        assert_eq!(body["error"], "invalid credentials");
    }

    // Even the right password is refused while locked
    let response = app.login(&email, PASSWORD).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await;
    assert_eq!(body["details"]["code"], "ACCOUNT_LOCKED");
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("account temporarily locked until"));

    app.state
        .memory_store()
        .unwrap()
        .backdate_login_attempt(&email, chrono::Duration::minutes(31))
        .await;

    assert_eq!(app.login(&email, PASSWORD).await.status(), StatusCode::OK);

    // The counter restarted: four more failures do not lock
    for _ in 0..4 {
        app.login(&email, "wrong-password").await;
    }
    assert_eq!(app.login(&email, PASSWORD).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_logout_clears_cookies_and_revokes_token() {
    let app = TestApp::new();
    let session = app.signed_in_user(&unique_email("bye")).await;

    let response = app.post("/api/auth/logout").session(&session).send().await;
    assert_eq!(response.status(), StatusCode::OK);
    for name in ["session_token", "user_id", "user_name", "csrf_token"] {
        let line = response.set_cookie_line(name).unwrap();
        assert!(line.contains("Max-Age=-1") || line.contains("Max-Age=0"), "{}", line);
    }

    assert!(app
        .state
        .stores
        .sessions
        .get(session.user_id)
        .await
        .unwrap()
        .is_none());

    let response = app.get("/api/users/me").session(&session).send().await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_current_user() {
    let app = TestApp::new();
    let email = unique_email("me");
    let session = app.signed_in_user(&email).await;

    let response = app.get("/api/users/me").session(&session).send().await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await;
    assert_eq!(body["data"]["id"], session.user_id.to_string());
    assert_eq!(body["data"]["email"], email);
}
