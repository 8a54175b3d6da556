// HTTP handlers and route builders
// Public auth endpoints, then the session-protected API

pub mod auth;
pub mod cookies;
pub mod events;
pub mod points;
pub mod redemptions;
pub mod transactions;
pub mod users;

use crate::app::AppState;
use axum::{
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;

/// Success envelope shared by every handler
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: message.into(),
        })
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data: None,
            message: message.into(),
        })
    }
}

// Authentication routes that need no session
pub fn public_auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/verify", post(auth::verify))
        .route("/resend-verification", post(auth::resend_verification))
        .route("/login", post(auth::login))
}

// Authentication routes behind the session check
pub fn session_auth_routes() -> Router<AppState> {
    Router::new().route("/logout", post(auth::logout))
}

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/me", get(users::get_current_user))
}

pub fn transaction_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(transactions::create_transaction))
        .route("/{id}", get(transactions::get_transaction))
        .route("/{id}/status", put(transactions::update_transaction_status))
        .route("/user/{customer_id}", get(transactions::list_customer_transactions))
}

pub fn points_routes() -> Router<AppState> {
    Router::new()
        .route("/transaction/{transaction_id}", get(points::get_entry_for_transaction))
        .route("/{customer_id}/{program_id}/balance", get(points::get_balance))
        .route("/{customer_id}/{program_id}/ledger", get(points::get_ledger))
        .route("/{customer_id}/{program_id}/earn", post(points::earn))
        .route("/{customer_id}/{program_id}/redeem", post(points::redeem))
}

pub fn redemption_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(redemptions::redeem_reward))
        .route("/{id}", get(redemptions::get_redemption))
        .route("/{id}/status", put(redemptions::update_redemption_status))
}

pub fn event_routes() -> Router<AppState> {
    Router::new().route("/reference/{reference_id}", get(events::events_for_reference))
}
