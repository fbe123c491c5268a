pub mod account;
pub mod auth;
pub mod health;
pub mod presence;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /ws                    WebSocket (token optional)
///
/// /auth/login            login (public)
/// /auth/refresh          refresh (public)
/// /auth/logout           logout (requires auth)
/// /auth/me               current user (requires auth)
///
/// /account/password      change password (requires auth)
///
/// /presence              online user ids (requires auth)
/// /presence/{user_id}    presence of one user (requires auth)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/auth", auth::router())
        .nest("/account", account::router())
        .merge(presence::router())
}
