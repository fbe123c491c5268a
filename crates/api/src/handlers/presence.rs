//! Handlers for the `/presence` resource.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use vigil_core::types::DbId;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Presence of a single user on this instance.
#[derive(Debug, Serialize)]
pub struct PresenceResponse {
    pub user_id: DbId,
    pub online: bool,
    pub connections: usize,
}

/// GET /api/v1/presence/{user_id}
pub async fn get_presence(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<DbId>,
) -> AppResult<Json<DataResponse<PresenceResponse>>> {
    let connections = state.presence.connection_count(user_id).await;
    Ok(Json(DataResponse {
        data: PresenceResponse {
            user_id,
            online: connections > 0,
            connections,
        },
    }))
}

/// GET /api/v1/presence
///
/// Ids of every user with at least one live connection, ascending.
pub async fn list_online(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> AppResult<Json<DataResponse<Vec<DbId>>>> {
    Ok(Json(DataResponse {
        data: state.presence.online_users().await,
    }))
}
