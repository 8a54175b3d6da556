// Redemption handlers

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    app::AppState,
    handlers::ApiResponse,
    middleware::auth::AuthenticatedUser,
    models::Redemption,
    services::redemption::{
        RedeemRewardRequest, RedemptionOutcome, StatusChangeOutcome,
        UpdateRedemptionStatusRequest,
    },
    utils::ServiceError,
};

/// POST /api/redemptions
pub async fn redeem_reward(
    State(state): State<AppState>,
    payload: Result<Json<RedeemRewardRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<RedemptionOutcome>>), ServiceError> {
    let Json(req) = payload?;
    let outcome = state.redemption_service.redeem_reward(req).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(outcome, "Reward redeemed"),
    ))
}

/// GET /api/redemptions/{id}
pub async fn get_redemption(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ApiResponse<Redemption>>, ServiceError> {
    let Path(id) = id?;
    let redemption = state.redemption_service.get_redemption(id).await?;
    Ok(ApiResponse::ok(redemption, "Redemption retrieved"))
}

/// PUT /api/redemptions/{id}/status
/// Canceling refunds the points once.
pub async fn update_redemption_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateRedemptionStatusRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<StatusChangeOutcome>>, ServiceError> {
    let Path(id) = id?;
    let Json(req) = payload?;
    let outcome = state
        .redemption_service
        .update_status(user.user_id, id, req.status)
        .await?;
    Ok(ApiResponse::ok(outcome, "Redemption status updated"))
}
