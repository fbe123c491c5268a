//! Request-scoped cancellation.
//!
//! [`request_cancellation`] attaches a fresh [`CancellationToken`] to every
//! request. If the response future is dropped before it completes (client
//! went away, timeout layer fired) the token is cancelled, and token store
//! work started on behalf of the request is abandoned.

use std::convert::Infallible;

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use tokio_util::sync::CancellationToken;

/// Handle to the current request's cancellation token.
#[derive(Debug, Clone, Default)]
pub struct RequestCancel(pub CancellationToken);

impl RequestCancel {
    pub fn token(&self) -> &CancellationToken {
        &self.0
    }
}

/// Middleware installing a [`RequestCancel`] extension.
pub async fn request_cancellation(mut request: Request, next: Next) -> Response {
    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    request.extensions_mut().insert(RequestCancel(token));

    let response = next.run(request).await;
    guard.disarm();
    response
}

impl<S: Send + Sync> FromRequestParts<S> for RequestCancel {
    type Rejection = Infallible;

    /// Routers built without the middleware get a token that never fires.
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestCancel>()
            .cloned()
            .unwrap_or_default())
    }
}
