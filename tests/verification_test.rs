// Racing consumers of a single verification code

use axum::http::StatusCode;
use loyalty_backend::repository::StoreError;

mod common;
use common::{unique_email, TestApp, PASSWORD};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mark_used_succeeds_exactly_once() {
    let app = TestApp::new();
    let (user_id, _) = app.register(&unique_email("race"), PASSWORD).await;
    let verification = app
        .state
        .stores
        .credentials
        .latest_verification(user_id)
        .await
        .unwrap()
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = app.state.stores.credentials.clone();
        let id = verification.id;
        handles.push(tokio::spawn(async move { store.mark_verification_used(id).await }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => ok += 1,
            Err(StoreError::NotFound(_)) => {},
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(ok, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_verify_activates_once() {
    let app = TestApp::new();
    let email = unique_email("verify-race");
    let (user_id, csrf) = app.register(&email, PASSWORD).await;
    let otp = app.latest_otp(user_id).await;

    let results = verify_four_times(&app, &email, &otp, &csrf).await;
    assert_eq!(results.iter().filter(|s| **s == StatusCode::OK).count(), 1);
    assert!(results
        .iter()
        .filter(|s| **s != StatusCode::OK)
        .all(|s| s.is_client_error()));
}

async fn verify_four_times(app: &TestApp, email: &str, otp: &str, csrf: &str) -> Vec<StatusCode> {
    let (a, b, c, d) = tokio::join!(
        app.verify(email, otp, csrf),
        app.verify(email, otp, csrf),
        app.verify(email, otp, csrf),
        app.verify(email, otp, csrf),
    );
    vec![a.status(), b.status(), c.status(), d.status()]
}
