// handlers/public/auth.rs - POST /register and POST /login

use axum::extract::State;
use serde::Serialize;

use crate::api::{format::format_timestamp, Payload, UserResource};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::IssuedToken;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub user: UserResource,
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: String,
}

impl From<IssuedToken> for TokenResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            user: UserResource::from(&issued.user),
            expires_at: format_timestamp(&issued.claims.expires_at()),
            token: issued.token,
            token_type: "Bearer",
        }
    }
}

/// POST /register - create a reader account and sign it in
///
/// Expects `name`, `email`, `password` and `password_confirmation`.
/// Responds 201 with the new user and a bearer token.
pub async fn register(State(state): State<AppState>, Payload(input): Payload) -> ApiResult<TokenResponse> {
    let issued = state.accounts().register(input).await?;
    Ok(ApiResponse::created(issued.into()))
}

/// POST /login - exchange credentials for a bearer token
pub async fn login(State(state): State<AppState>, Payload(input): Payload) -> ApiResult<TokenResponse> {
    let issued = state.accounts().login(input).await?;
    Ok(ApiResponse::success(issued.into()))
}
