//! Request extractors and middleware.
//!
//! - [`auth::AuthUser`] -- the authenticated caller behind a Bearer token.
//! - [`origin::RequestOrigin`] -- `scheme://host` used as token issuer/audience fallback.
//! - [`cancel`] -- per-request [`CancellationToken`](tokio_util::sync::CancellationToken).

pub mod auth;
pub mod cancel;
pub mod origin;
