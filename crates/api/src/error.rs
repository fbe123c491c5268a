use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use vigil_core::error::CoreError;
use vigil_db::StoreError;

use crate::auth::issuer::AuthError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `vigil_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A token, user or connection store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The request was abandoned before its work finished.
    #[error("Request cancelled")]
    Cancelled,

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<AuthError> for AppError {
    /// Every rejected credential collapses into the same opaque 401.
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Rejected(_) => AppError::Core(CoreError::unauthorized_token()),
            AuthError::Store(e) => AppError::Store(e),
            AuthError::Signing(e) => AppError::InternalError(format!("Token signing failed: {e}")),
            AuthError::Cancelled => AppError::Cancelled,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    internal()
                }
            },

            // --- Store errors ---
            AppError::Store(err) => {
                tracing::error!(error = %err, "Store error");
                internal()
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Cancelled => {
                tracing::debug!("Request cancelled before completion");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "CANCELLED",
                    "Request cancelled".to_string(),
                )
            }
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::rejection::RejectReason;

    #[test]
    fn every_rejection_reason_maps_to_the_same_401() {
        for reason in [
            RejectReason::Malformed,
            RejectReason::Expired,
            RejectReason::Revoked,
            RejectReason::StaleSession,
            RejectReason::UnknownUser,
            RejectReason::Inactive,
        ] {
            let response = AppError::from(AuthError::Rejected(reason)).into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{reason}");
        }
    }

    #[test]
    fn store_failure_is_sanitised_500() {
        let err = AppError::from(AuthError::Store(StoreError::Unavailable("down".into())));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
