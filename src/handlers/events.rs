use axum::{
    extract::{rejection::PathRejection, Path, State},
    Json,
};
use uuid::Uuid;

use crate::{app::AppState, handlers::ApiResponse, models::EventLog, utils::ServiceError};

/// GET /api/events/reference/{reference_id}
pub async fn events_for_reference(
    State(state): State<AppState>,
    reference_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ApiResponse<Vec<EventLog>>>, ServiceError> {
    let Path(reference_id) = reference_id?;
    let events = state.events.events_for_reference(reference_id).await?;
    Ok(ApiResponse::ok(events, "Events retrieved"))
}
