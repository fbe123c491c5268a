//! Shared response envelope types for API handlers.
//!
//! Resource reads use a `{ "data": ... }` envelope. Session responses from
//! sign-in and refresh are returned bare so OAuth-style clients can read
//! `access_token` at the top level.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
///
/// ```ignore
/// Ok(Json(DataResponse { data: items }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
