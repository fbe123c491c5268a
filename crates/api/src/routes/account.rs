//! Route definitions for the `/account` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::account;
use crate::state::AppState;

/// Routes mounted at `/account`.
///
/// ```text
/// POST /password  -> change_password (requires auth)
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/password", post(account::change_password))
}
