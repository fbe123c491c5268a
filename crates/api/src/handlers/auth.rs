//! Handlers for the `/auth` resource (login, refresh, logout, me).

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use vigil_core::error::CoreError;
use vigil_core::types::{DbId, Timestamp};

use crate::auth::issuer::TokenPair;
use crate::auth::password::verify_password;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::cancel::RequestCancel;
use crate::middleware::origin::RequestOrigin;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Request body for `POST /auth/refresh`.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Optional request body for `POST /auth/logout`.
#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// Response of `GET /auth/me`.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: DbId,
    pub username: String,
    pub last_active_at: Option<Timestamp>,
    pub online: bool,
    pub connections: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/login
///
/// Authenticate with username + password. Returns a fresh token pair.
pub async fn login(
    State(state): State<AppState>,
    origin: RequestOrigin,
    cancel: RequestCancel,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<TokenPair>> {
    let invalid =
        || AppError::Core(CoreError::Unauthorized("Invalid username or password".into()));

    let user = state
        .users
        .find_by_username(&input.username)
        .await?
        .ok_or_else(invalid)?;

    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
    if !password_valid {
        tracing::info!(user_id = user.id, "Login failed: wrong password");
        return Err(invalid());
    }

    if !user.is_active {
        return Err(AppError::Core(CoreError::Forbidden(
            "Account is deactivated".into(),
        )));
    }

    let pair = state
        .tokens
        .issue(
            &user,
            &origin.token_origin(&state.config.jwt),
            cancel.token(),
        )
        .await?;

    tracing::info!(user_id = user.id, "User logged in");
    Ok(Json(pair))
}

/// POST /api/v1/auth/refresh
///
/// Exchange a refresh token for a new pair. The presented token is consumed.
pub async fn refresh(
    State(state): State<AppState>,
    origin: RequestOrigin,
    cancel: RequestCancel,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<TokenPair>> {
    let pair = state
        .tokens
        .refresh(
            &input.refresh_token,
            &origin.token_origin(&state.config.jwt),
            cancel.token(),
        )
        .await?;
    Ok(Json(pair))
}

/// POST /api/v1/auth/logout
///
/// Retire the presented refresh token, or every session of the caller when
/// multiple sessions are disabled. The body is optional. Returns 204.
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
    cancel: RequestCancel,
    body: Bytes,
) -> AppResult<StatusCode> {
    let input = parse_optional_json::<LogoutRequest>(&body)?;

    let removed = state
        .tokens
        .invalidate(
            auth.user_id,
            input.refresh_token.as_deref(),
            state.config.session.allow_multiple_sessions,
            cancel.token(),
        )
        .await?;

    tracing::info!(user_id = auth.user_id, removed, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/me
pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<DataResponse<MeResponse>>> {
    let connections = state.presence.connection_count(auth.user_id).await;
    Ok(Json(DataResponse {
        data: MeResponse {
            id: auth.user.id,
            username: auth.user.username,
            last_active_at: auth.user.last_active_at,
            online: connections > 0,
            connections,
        },
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Decode a JSON body that may be empty. An empty body yields `T::default()`.
fn parse_optional_json<T>(body: &[u8]) -> AppResult<T>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))
}
