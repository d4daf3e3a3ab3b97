// handlers/public/password.rs - password reset flow

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::api::Payload;
use crate::error::ApiError;
use crate::state::AppState;

/// POST /password/forgot - mail a reset link to a known address
pub async fn forgot(State(state): State<AppState>, Payload(input): Payload) -> Result<Json<Value>, ApiError> {
    state.accounts().forgot_password(input).await?;
    Ok(Json(json!({ "message": "We have emailed your password reset link!" })))
}

/// POST /password/reset - consume a reset token and set a new password
pub async fn reset(State(state): State<AppState>, Payload(input): Payload) -> Result<Json<Value>, ApiError> {
    state.accounts().reset_password(input).await?;
    Ok(Json(json!({ "message": "Your password has been reset!" })))
}
