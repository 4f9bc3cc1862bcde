use authz::{OwnershipGuard, UserId};
use axum::{
    extract::{Path, State},
    Json,
};
use tracing::warn;
use user::auth::AuthContext;

use crate::{
    error::{ApiError, ApiResult},
    models::UserProfileResponse,
    AppState,
};

/// Profile of the addressed user. Only the user themself may read it.
/// GET /api/users/{user_id}
#[utoipa::path(
    get,
    path = "/api/users/{user_id}",
    params(
        ("user_id" = i64, Path, description = "Id of the owning user")
    ),
    responses(
        (status = 200, description = "User profile", body = UserProfileResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiErrorResponse),
        (status = 403, description = "Access denied", body = crate::error::ApiErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ApiErrorResponse)
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<UserProfileResponse>> {
    OwnershipGuard::new(auth.principal.clone()).check(user_id)?;

    let user = state
        .user_manager
        .store()
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| {
            warn!("Authenticated user {} has no stored record", user_id);
            ApiError::NotFound(format!("User {}", user_id))
        })?;

    Ok(Json(UserProfileResponse::from(user)))
}
