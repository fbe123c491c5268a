//! Bearer-token authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use vigil_core::error::CoreError;
use vigil_core::types::DbId;
use vigil_db::models::user::User;

use crate::auth::jwt::AccessClaims;
use crate::error::AppError;
use crate::middleware::cancel::RequestCancel;
use crate::middleware::origin::RequestOrigin;
use crate::state::AppState;

/// Authenticated caller, resolved through the full token check: signature,
/// stored record and live security stamp.
///
/// ```ignore
/// async fn my_handler(auth: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = auth.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: DbId,
    /// The directory record as loaded during validation.
    pub user: User,
    pub claims: AccessClaims,
}

/// Pull the token out of an `Authorization: Bearer <token>` header.
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing or malformed Authorization header".into(),
                ))
            })?;

        let origin = RequestOrigin::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});
        let cancel = RequestCancel::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});

        let session = state
            .tokens
            .validate(&token, &origin.token_origin(&state.config.jwt), cancel.token())
            .await?;

        Ok(AuthUser {
            user_id: session.user.id,
            user: session.user,
            claims: session.claims,
        })
    }
}
