use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::auth::{Claims, Identity, Permission};
use crate::error::ApiError;
use crate::state::AppState;

const UNAUTHENTICATED: &str = "Unauthenticated.";

/// Authenticated request context, inserted by [`require_auth`]
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub identity: Identity,
    pub claims: Claims,
}

/// Bearer authentication: verifies the JWT, rejects revoked tokens and
/// resolves the identity with its effective permissions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(request.headers()).map_err(|reason| {
        tracing::debug!("Rejected request: {}", reason);
        ApiError::unauthenticated(UNAUTHENTICATED)
    })?;

    let claims = state.tokens.verify(token)?;

    if state.store.is_token_revoked(claims.jti).await? {
        tracing::warn!(user_id = claims.sub, jti = %claims.jti, "revoked token presented");
        return Err(ApiError::unauthenticated(UNAUTHENTICATED));
    }

    let identity = state.store.identity(claims.sub).await?.ok_or_else(|| {
        tracing::warn!(user_id = claims.sub, "token subject no longer exists");
        ApiError::unauthenticated(UNAUTHENTICATED)
    })?;

    request.extensions_mut().insert(AuthUser { identity, claims });
    Ok(next.run(request).await)
}

/// Static permission gate; must run inside [`require_auth`].
pub async fn require_permission(permission: Permission, request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::unauthenticated(UNAUTHENTICATED))?;

    if !user.identity.can(permission) {
        tracing::warn!(user_id = user.identity.id, permission = %permission, "permission denied");
        return Err(ApiError::forbidden("User does not have the right permissions."));
    }

    Ok(next.run(request).await)
}

pub async fn require_create_posts(request: Request, next: Next) -> Result<Response, ApiError> {
    require_permission(Permission::CreatePosts, request, next).await
}

/// Extract the token from an `Authorization: Bearer <token>` header
fn extract_bearer(headers: &HeaderMap) -> Result<&str, &'static str> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or("Missing Authorization header")?
        .to_str()
        .map_err(|_| "Invalid Authorization header format")?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or("Authorization header must use Bearer token format")?
        .trim();

    if token.is_empty() {
        return Err("Empty bearer token");
    }
    Ok(token)
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthenticated(UNAUTHENTICATED))
    }
}
