// Points handlers: balance and ledger reads plus direct earn/redeem

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    app::AppState,
    handlers::ApiResponse,
    models::PointsLedger,
    services::PointsRequest,
    utils::ServiceError,
};

/// Body of direct earn/redeem calls; `points` is a positive magnitude
#[derive(Debug, Deserialize)]
pub struct PointsBody {
    pub points: i64,
    pub transaction_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub customer_id: Uuid,
    pub program_id: Uuid,
    pub balance: i64,
}

type PairPath = Result<Path<(Uuid, Uuid)>, PathRejection>;

/// GET /api/points/{customer_id}/{program_id}/balance
pub async fn get_balance(
    State(state): State<AppState>,
    path: PairPath,
) -> Result<Json<ApiResponse<BalanceResponse>>, ServiceError> {
    let Path((customer_id, program_id)) = path?;
    let balance = state.points_service.get_balance(customer_id, program_id).await?;
    Ok(ApiResponse::ok(
        BalanceResponse {
            customer_id,
            program_id,
            balance,
        },
        "Balance retrieved",
    ))
}

/// GET /api/points/{customer_id}/{program_id}/ledger
pub async fn get_ledger(
    State(state): State<AppState>,
    path: PairPath,
) -> Result<Json<ApiResponse<Vec<PointsLedger>>>, ServiceError> {
    let Path((customer_id, program_id)) = path?;
    let entries = state.points_service.get_ledger(customer_id, program_id).await?;
    Ok(ApiResponse::ok(entries, "Ledger retrieved"))
}

/// POST /api/points/{customer_id}/{program_id}/earn
pub async fn earn(
    State(state): State<AppState>,
    path: PairPath,
    payload: Result<Json<PointsBody>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<PointsLedger>>), ServiceError> {
    let Path((customer_id, program_id)) = path?;
    let Json(body) = payload?;

    let entry = state
        .points_service
        .earn(PointsRequest {
            customer_id,
            program_id,
            points: body.points,
            transaction_id: body.transaction_id,
        })
        .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(entry, "Points earned")))
}

/// POST /api/points/{customer_id}/{program_id}/redeem
pub async fn redeem(
    State(state): State<AppState>,
    path: PairPath,
    payload: Result<Json<PointsBody>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<PointsLedger>>), ServiceError> {
    let Path((customer_id, program_id)) = path?;
    let Json(body) = payload?;

    let entry = state
        .points_service
        .redeem(PointsRequest {
            customer_id,
            program_id,
            points: body.points,
            transaction_id: body.transaction_id,
        })
        .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(entry, "Points redeemed")))
}

/// GET /api/points/transaction/{transaction_id}
pub async fn get_entry_for_transaction(
    State(state): State<AppState>,
    transaction_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ApiResponse<PointsLedger>>, ServiceError> {
    let Path(transaction_id) = transaction_id?;
    let entry = state
        .points_service
        .entry_for_transaction(transaction_id)
        .await?;
    Ok(ApiResponse::ok(entry, "Ledger entry retrieved"))
}
