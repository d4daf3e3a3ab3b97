// handlers/protected/user.rs - GET /user and POST /logout

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::api::IdentityResource;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

/// GET /user - the caller with roles and effective permissions
pub async fn show(auth: AuthUser) -> ApiResult<IdentityResource> {
    Ok(ApiResponse::success(IdentityResource::from(&auth.identity)))
}

/// POST /logout - revoke the presented token
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Value>, ApiError> {
    state.accounts().logout(&auth.claims).await?;
    Ok(Json(json!({ "message": "Logged out successfully" })))
}
