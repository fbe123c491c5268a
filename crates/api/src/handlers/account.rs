//! Handlers for the `/account` resource.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use vigil_core::error::CoreError;

use crate::auth::password::{hash_password, validate_new_password, verify_password};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::cancel::RequestCancel;
use crate::state::AppState;

/// Request body for `POST /account/password`.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// POST /api/v1/account/password
///
/// The directory rotates the security stamp with the new hash, which retires
/// every outstanding access token. Stored refresh tokens are then removed so
/// no session survives the change. Returns 204.
///
/// Request cancellation is honoured up to the directory write. Once the new
/// password is committed, the session cleanup runs to completion.
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    cancel: RequestCancel,
    Json(input): Json<ChangePasswordRequest>,
) -> AppResult<StatusCode> {
    let matches = verify_password(&input.current_password, &auth.user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !matches {
        return Err(AppError::Core(CoreError::Validation(
            "Current password is incorrect".into(),
        )));
    }

    validate_new_password(&input.current_password, &input.new_password)
        .map_err(|msg| AppError::Core(CoreError::Validation(msg)))?;

    let hash = hash_password(&input.new_password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    if cancel.token().is_cancelled() {
        return Err(AppError::Cancelled);
    }
    let updated = state.users.update_password(auth.user_id, &hash).await?;
    if !updated {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "User",
            id: auth.user_id,
        }));
    }

    let removed = state
        .tokens
        .invalidate(auth.user_id, None, false, &CancellationToken::new())
        .await?;

    tracing::info!(user_id = auth.user_id, removed, "Password changed");
    Ok(StatusCode::NO_CONTENT)
}
