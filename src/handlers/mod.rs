// handlers/mod.rs - HTTP handlers grouped by security tier
//
// public:    registration, login and the password reset flow (no token)
// protected: everything behind `require_auth`

pub mod protected;
pub mod public;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

/// GET / - service banner
pub async fn root() -> Json<Value> {
    Json(json!({
        "data": {
            "name": "Blog API",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": {
                "auth": "/register, /login, /logout (public token acquisition, protected logout)",
                "password": "/password/forgot, /password/reset (public)",
                "user": "/user (protected)",
                "posts": "/posts[/:id] (protected)",
                "categories": "/categories[/:id] (protected)",
                "tags": "/tags[/:id] (protected)",
            },
            "prefixes": ["/", "/api"],
        }
    }))
}

/// GET /health - liveness plus a storage round trip
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = Utc::now();
    let backend = state.store.backend();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "data": { "status": "ok", "timestamp": now, "database": backend }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "message": "Database unavailable",
                    "data": { "status": "degraded", "timestamp": now, "database": backend }
                })),
            )
        }
    }
}
