// HTTP API Error Types
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Field name -> every reason that field failed.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // 400 Bad Request, keyed by field (password reset flows)
    #[error("bad request")]
    BadRequest { errors: FieldErrors },

    // 400 Bad Request, body could not be parsed at all
    #[error("{0}")]
    InvalidPayload(String),

    // 401 Unauthorized
    #[error("{0}")]
    Unauthenticated(String),

    // 403 Forbidden
    #[error("{0}")]
    Forbidden(String),

    // 404 Not Found
    #[error("{0}")]
    NotFound(String),

    // 413 Payload Too Large
    #[error("{0}")]
    PayloadTooLarge(String),

    // 422 Unprocessable Entity
    #[error("{message}")]
    Validation { message: String, errors: FieldErrors },

    // 500 Internal Server Error
    #[error("{0}")]
    InternalServerError(String),

    // 503 Service Unavailable
    #[error("{0}")]
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest { .. } => 400,
            ApiError::InvalidPayload(_) => 400,
            ApiError::Unauthenticated(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::Validation { .. } => 422,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Convert to JSON response body. `None` means an empty body.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            ApiError::NotFound(_) => None,
            ApiError::BadRequest { errors } => Some(json!(errors)),
            ApiError::Validation { message, errors } => Some(json!({
                "message": message,
                "errors": errors,
            })),
            other => Some(json!({ "error": other.to_string() })),
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.into(), vec![reason.into()]);
        ApiError::BadRequest { errors }
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        ApiError::InvalidPayload(message.into())
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ApiError::Unauthenticated(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        ApiError::PayloadTooLarge(message.into())
    }

    /// Summary message follows the first failure: "The title field is required. (and 1 more error)"
    pub fn validation(errors: FieldErrors) -> Self {
        let total: usize = errors.values().map(Vec::len).sum();
        let first = errors
            .values()
            .flat_map(|reasons| reasons.first())
            .next()
            .cloned()
            .unwrap_or_else(|| "The given data was invalid.".to_string());
        let message = match total {
            0 | 1 => first,
            2 => format!("{} (and 1 more error)", first),
            n => format!("{} (and {} more errors)", first, n - 1),
        };
        ApiError::Validation { message, errors }
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<crate::database::DatabaseError> for ApiError {
    fn from(err: crate::database::DatabaseError) -> Self {
        match err {
            crate::database::DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            crate::database::DatabaseError::ConnectionError(msg) => {
                tracing::error!("Database connection error: {}", msg);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            crate::database::DatabaseError::ConfigMissing(what) => {
                tracing::error!("Database configuration missing: {}", what);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            crate::database::DatabaseError::Conflict(field) => {
                // Unique constraint races surface as a validation failure on the offending field
                let reason = format!("The {} has already been taken.", field.replace('_', " "));
                ApiError::validation(FieldErrors::from([(field, vec![reason])]))
            }
            crate::database::DatabaseError::Corrupt(msg) => {
                tracing::error!("Corrupt row: {}", msg);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            crate::database::DatabaseError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<crate::storage::StorageError> for ApiError {
    fn from(err: crate::storage::StorageError) -> Self {
        tracing::error!("File storage error: {}", err);
        ApiError::internal_server_error("Failed to store uploaded file")
    }
}

impl From<crate::auth::JwtError> for ApiError {
    fn from(err: crate::auth::JwtError) -> Self {
        match err {
            crate::auth::JwtError::InvalidToken(msg) => {
                tracing::debug!("Rejected bearer token: {}", msg);
                ApiError::unauthenticated("Unauthenticated.")
            }
            other => {
                tracing::error!("Token service error: {}", other);
                ApiError::internal_server_error("Failed to issue token")
            }
        }
    }
}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        match self.to_json() {
            Some(body) => (status, Json(body)).into_response(),
            None => status.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_summarises_failures() {
        let mut errors = FieldErrors::new();
        errors.insert("content".into(), vec!["The content field is required.".into()]);
        errors.insert("title".into(), vec!["The title field is required.".into()]);
        let err = ApiError::validation(errors);
        assert_eq!(err.status_code(), 422);
        let body = err.to_json().unwrap();
        assert_eq!(body["message"], "The content field is required. (and 1 more error)");
        assert_eq!(body["errors"]["title"][0], "The title field is required.");
    }

    #[test]
    fn forbidden_uses_error_envelope() {
        let body = ApiError::forbidden("Unauthorized").to_json().unwrap();
        assert_eq!(body, json!({ "error": "Unauthorized" }));
    }

    #[test]
    fn not_found_has_no_body() {
        assert!(ApiError::not_found("Post 1 not found").to_json().is_none());
    }
}
