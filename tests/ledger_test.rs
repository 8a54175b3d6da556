// Integration tests for the transaction pipeline and the points ledger

use axum::http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

mod common;
use common::{unique_email, ClientSession, Seed, TestApp};

async fn setup() -> (TestApp, ClientSession, Seed) {
    let app = TestApp::new();
    let session = app.signed_in_user(&unique_email("ledger")).await;
    let seed = app.seed(session.user_id).await;
    (app, session, seed)
}

async fn transaction_id(response: common::TestResponse) -> Uuid {
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await;
    body["data"]["transaction"]["transaction_id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap()
}

#[tokio::test]
async fn test_purchase_earns_points() {
    let (app, session, seed) = setup().await;
    assert_eq!(app.balance(&session, &seed).await, 0);

    let response = app.transact(&session, &seed, "purchase", 100.0).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await;
    assert_eq!(body["data"]["points_delta"], 100);
    assert_eq!(body["data"]["transaction"]["status"], "completed");
    assert_eq!(body["data"]["transaction"]["transaction_amount"], 100.0);
    assert_eq!(body["data"]["ledger_entry"]["points_earned"], 100);
    assert_eq!(body["data"]["ledger_entry"]["points_balance"], 100);

    assert_eq!(app.balance(&session, &seed).await, 100);
}

#[tokio::test]
async fn test_fixed_policy_per_type() {
    let (app, session, seed) = setup().await;

    let bonus = app.transact(&session, &seed, "bonus", 10.75).await;
    let body: Value = bonus.json().await;
    assert_eq!(body["data"]["points_delta"], 21);

    let refund = app.transact(&session, &seed, "refund", 5.99).await;
    let body: Value = refund.json().await;
    assert_eq!(body["data"]["points_delta"], -5);
    assert_eq!(body["data"]["ledger_entry"]["points_redeemed"], 5);

    assert_eq!(app.balance(&session, &seed).await, 16);
}

#[tokio::test]
async fn test_invalid_amounts_rejected() {
    let (app, session, seed) = setup().await;

    for amount in [0.0, -5.0, 1.234] {
        let response = app.transact(&session, &seed, "purchase", amount).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "amount {}", amount);
    }
    assert!(app.ledger(&session, &seed).await.is_empty());
}

#[tokio::test]
async fn test_unknown_customer_is_not_found() {
    let (app, session, seed) = setup().await;
    let response = app
        .post("/api/transactions")
        .session(&session)
        .json(&json!({
            "merchant_customers_id": Uuid::new_v4(),
            "program_id": seed.program.id,
            "transaction_type": "purchase",
            "transaction_amount": 10
        }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_refund_beyond_balance_fails_and_marks_transaction() {
    let (app, session, seed) = setup().await;
    app.transact(&session, &seed, "purchase", 10.0).await;

    let response = app.transact(&session, &seed, "refund", 50.0).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await;
    assert_eq!(body["details"]["code"], "INSUFFICIENT_POINTS");
    assert_eq!(body["details"]["available"], 10);
    assert_eq!(body["details"]["requested"], 50);

    let list = app
        .get(&format!("/api/transactions/user/{}", seed.customer.id))
        .session(&session)
        .send()
        .await;
    let body: Value = list.json().await;
    let statuses: Vec<&str> = body["data"]["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["failed", "completed"]);
    assert_eq!(app.ledger(&session, &seed).await.len(), 1);
}

#[tokio::test]
async fn test_direct_redeem_with_insufficient_balance_writes_nothing() {
    let (app, session, seed) = setup().await;
    let txn = transaction_id(app.transact(&session, &seed, "purchase", 10.0).await).await;
    assert_eq!(app.balance(&session, &seed).await, 10);

    let response = app
        .post(&format!(
            "/api/points/{}/{}/redeem",
            seed.customer.id, seed.program.id
        ))
        .session(&session)
        .json(&json!({ "points": 50, "transaction_id": txn }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await;
    assert_eq!(body["details"]["code"], "INSUFFICIENT_POINTS");

    assert_eq!(app.ledger(&session, &seed).await.len(), 1);
    assert_eq!(app.balance(&session, &seed).await, 10);
}

#[tokio::test]
async fn test_direct_earn_and_redeem_follow_the_sum_law() {
    let (app, session, seed) = setup().await;
    let txn = transaction_id(app.transact(&session, &seed, "purchase", 1.0).await).await;
    let base = format!("/api/points/{}/{}", seed.customer.id, seed.program.id);

    let moves: [(&str, i64); 6] = [
        ("earn", 30),
        ("redeem", 7),
        ("earn", 12),
        ("redeem", 36),
        ("earn", 5),
        ("redeem", 1),
    ];
    let mut expected = 1;
    for (kind, points) in moves {
        let response = app
            .post(&format!("{}/{}", base, kind))
            .session(&session)
            .json(&json!({ "points": points, "transaction_id": txn }))
            .send()
            .await;
        assert_eq!(response.status(), StatusCode::CREATED, "{} {}", kind, points);
        expected += if kind == "earn" { points } else { -points };

        let body: Value = response.json().await;
        assert_eq!(body["data"]["points_balance"], expected);
    }

    let ledger = app.ledger(&session, &seed).await;
    assert_eq!(ledger.len(), 7);
    let earned: i64 = ledger.iter().map(|e| e["points_earned"].as_i64().unwrap()).sum();
    let redeemed: i64 = ledger.iter().map(|e| e["points_redeemed"].as_i64().unwrap()).sum();
    assert_eq!(ledger[0]["points_balance"], earned - redeemed);
    assert_eq!(app.balance(&session, &seed).await, expected);
    for entry in &ledger {
        assert!(entry["points_balance"].as_i64().unwrap() >= 0);
    }
}

#[tokio::test]
async fn test_direct_points_validation() {
    let (app, session, seed) = setup().await;
    let txn = transaction_id(app.transact(&session, &seed, "purchase", 20.0).await).await;
    let base = format!("/api/points/{}/{}", seed.customer.id, seed.program.id);

    for (kind, points) in [("earn", 0), ("earn", -3), ("redeem", -5), ("redeem", 0)] {
        let response = app
            .post(&format!("{}/{}", base, kind))
            .session(&session)
            .json(&json!({ "points": points, "transaction_id": txn }))
            .send()
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{} {}", kind, points);
    }

    let response = app
        .post(&format!("{}/earn", base))
        .session(&session)
        .json(&json!({ "points": 5, "transaction_id": Uuid::new_v4() }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .get(&format!("/api/points/{}/{}/balance", "not-a-uuid", seed.program.id))
        .session(&session)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_concurrent_earn_and_redeem_keep_balance_consistent() {
    let (app, session, seed) = setup().await;
    let txn = transaction_id(app.transact(&session, &seed, "purchase", 100.0).await).await;

    let mut handles = Vec::new();
    for i in 0..40 {
        let points = &app.state.points_service;
        let points = points.clone();
        let (customer_id, program_id) = (seed.customer.id, seed.program.id);
        handles.push(tokio::spawn(async move {
            let req = loyalty_backend::services::PointsRequest {
                customer_id,
                program_id,
                points: 3,
                transaction_id: txn,
            };
            if i % 2 == 0 {
                points.earn(req).await.is_ok()
            } else {
                points.redeem(req).await.is_ok()
            }
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap());
    }

    let ledger = app.ledger(&session, &seed).await;
    assert_eq!(ledger.len(), 41);
    assert_eq!(ledger[0]["points_balance"], 100);
    assert_eq!(app.balance(&session, &seed).await, 100);
}

#[tokio::test]
async fn test_transaction_lookups_and_status() {
    let (app, session, seed) = setup().await;
    let txn = transaction_id(app.transact(&session, &seed, "purchase", 42.5).await).await;

    let response = app
        .get(&format!("/api/transactions/{}", txn))
        .session(&session)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await;
    assert_eq!(body["data"]["transaction_amount"], 42.5);
    assert_eq!(body["data"]["transaction_type"], "purchase");

    let response = app
        .get(&format!("/api/points/transaction/{}", txn))
        .session(&session)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await;
    assert_eq!(body["data"]["points_earned"], 42);

    let response = app
        .put(&format!("/api/transactions/{}/status", txn))
        .session(&session)
        .json(&json!({ "status": "canceled" }))
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await;
    assert_eq!(body["data"]["status"], "canceled");
    assert_eq!(body["data"]["transaction_amount"], 42.5);

    let response = app
        .get(&format!("/api/transactions/{}", Uuid::new_v4()))
        .session(&session)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_customer_transactions_are_paginated() {
    let (app, session, seed) = setup().await;
    for amount in 1..=12 {
        app.transact(&session, &seed, "purchase", amount as f64).await;
    }

    let response = app
        .get(&format!(
            "/api/transactions/user/{}?page=2&limit=5",
            seed.customer.id
        ))
        .session(&session)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await;
    let page = &body["data"];
    assert_eq!(page["total_items"], 12);
    assert_eq!(page["current_page"], 2);
    assert_eq!(page["per_page"], 5);
    assert_eq!(page["total_pages"], 3);
    assert_eq!(page["data"].as_array().unwrap().len(), 5);
    // Newest first: page 2 starts at the 6th newest
    assert_eq!(page["data"][0]["transaction_amount"], 7.0);

    let defaults = app
        .get(&format!("/api/transactions/user/{}", seed.customer.id))
        .session(&session)
        .send()
        .await;
    let body: Value = defaults.json().await;
    assert_eq!(body["data"]["per_page"], 10);
    assert_eq!(body["data"]["data"].as_array().unwrap().len(), 10);

    for query in ["page=0", "limit=0", "limit=101"] {
        let response = app
            .get(&format!(
                "/api/transactions/user/{}?{}",
                seed.customer.id, query
            ))
            .session(&session)
            .send()
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", query);
    }
}

#[tokio::test]
async fn test_transaction_created_event_is_logged() {
    let (app, session, seed) = setup().await;
    let txn = transaction_id(app.transact(&session, &seed, "purchase", 8.0).await).await;
    assert!(app.state.events.drain(std::time::Duration::from_secs(5)).await);

    let response = app
        .get(&format!("/api/events/reference/{}", txn))
        .session(&session)
        .send()
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await;
    let events = body["data"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event_type"], "transaction_created");
    assert_eq!(events[0]["actor_type"], "merchant");
    assert_eq!(events[0]["details"]["points_delta"], 8);
}
