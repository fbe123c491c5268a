//! Route definitions for the `/presence` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::presence;
use crate::state::AppState;

/// Presence routes, merged at the API root.
///
/// ```text
/// GET /presence            -> list_online (requires auth)
/// GET /presence/{user_id}  -> get_presence (requires auth)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/presence", get(presence::list_online))
        .route("/presence/{user_id}", get(presence::get_presence))
}
