// Transaction handlers
// Creating a transaction drives the ledger; rows are otherwise read-only apart from status.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    app::AppState,
    handlers::ApiResponse,
    middleware::auth::AuthenticatedUser,
    models::{PaginatedResponse, Pagination, PaginationQuery, Transaction, TransactionStatus},
    services::{CreateTransactionRequest, TransactionOutcome},
    utils::ServiceError,
};

#[derive(Debug, Deserialize)]
pub struct UpdateTransactionStatusRequest {
    pub status: TransactionStatus,
}

/// POST /api/transactions
pub async fn create_transaction(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    payload: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<TransactionOutcome>>), ServiceError> {
    let Json(req) = payload?;
    let outcome = state.transaction_service.create_transaction(req).await?;

    info!(
        actor = %user.user_id,
        transaction_id = %outcome.transaction.transaction_id,
        points_delta = outcome.points_delta,
        "Transaction recorded"
    );
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(outcome, "Transaction created"),
    ))
}

/// GET /api/transactions/{id}
pub async fn get_transaction(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ApiResponse<Transaction>>, ServiceError> {
    let Path(id) = id?;
    let transaction = state.transaction_service.get_transaction(id).await?;
    Ok(ApiResponse::ok(transaction, "Transaction retrieved"))
}

/// PUT /api/transactions/{id}/status
pub async fn update_transaction_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateTransactionStatusRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<Transaction>>, ServiceError> {
    let Path(id) = id?;
    let Json(req) = payload?;
    let transaction = state.transaction_service.update_status(id, req.status).await?;

    info!(actor = %user.user_id, transaction_id = %id, status = %req.status, "Transaction status updated");
    Ok(ApiResponse::ok(transaction, "Transaction status updated"))
}

/// GET /api/transactions/user/{customer_id}?page=&limit=
pub async fn list_customer_transactions(
    State(state): State<AppState>,
    customer_id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<PaginationQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<PaginatedResponse<Transaction>>>, ServiceError> {
    let Path(customer_id) = customer_id?;
    let Query(query) = query?;
    let pagination = Pagination::try_from(query).map_err(ServiceError::Validation)?;

    let page = state
        .transaction_service
        .list_for_customer(customer_id, pagination)
        .await?;
    Ok(ApiResponse::ok(page, "Transactions retrieved"))
}
