use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// The one message every rejected credential produces, whatever the cause.
    pub const GENERIC_UNAUTHORIZED: &'static str = "Invalid or expired token";

    /// Build the opaque `Unauthorized` error returned for any rejected token.
    pub fn unauthorized_token() -> Self {
        CoreError::Unauthorized(Self::GENERIC_UNAUTHORIZED.into())
    }
}
