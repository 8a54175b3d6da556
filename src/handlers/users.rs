use axum::{extract::State, Json};

use crate::{
    app::AppState, handlers::ApiResponse, middleware::auth::AuthenticatedUser, models::User,
    utils::ServiceError,
};

/// GET /api/users/me
pub async fn get_current_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<User>>, ServiceError> {
    let current = state.auth_service.current_user(user.user_id).await?;
    Ok(ApiResponse::ok(current, "User retrieved"))
}
