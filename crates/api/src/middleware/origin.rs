//! Request origin extractor used for token issuer/audience fallback.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::header::HOST;
use axum::http::request::Parts;

use crate::auth::jwt::{JwtConfig, TokenOrigin};

/// Host used when a request carries neither a `Host` header nor an absolute URI.
const FALLBACK_HOST: &str = "localhost";

/// `scheme://host` of the incoming request.
///
/// The scheme comes from `x-forwarded-proto` when a proxy sets it, otherwise
/// `http`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin(pub String);

impl RequestOrigin {
    /// Issuer/audience for tokens minted or checked on this request.
    pub fn token_origin(&self, config: &JwtConfig) -> TokenOrigin {
        config.origin_for(&self.0)
    }

    fn from_parts(parts: &Parts) -> Self {
        let scheme = parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "http".to_string());

        let host = parts
            .headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| parts.uri.authority().map(|a| a.to_string()))
            .unwrap_or_else(|| FALLBACK_HOST.to_string());

        RequestOrigin(format!("{scheme}://{host}"))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestOrigin {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn origin_of(request: Request<()>) -> String {
        let (parts, _) = request.into_parts();
        RequestOrigin::from_parts(&parts).0
    }

    #[test]
    fn host_header_and_forwarded_proto() {
        let request = Request::builder()
            .uri("/api/v1/auth/me")
            .header("host", "api.example.com")
            .header("x-forwarded-proto", "https")
            .body(())
            .unwrap();
        assert_eq!(origin_of(request), "https://api.example.com");
    }

    #[test]
    fn missing_host_falls_back_to_localhost() {
        let request = Request::builder().uri("/health").body(()).unwrap();
        assert_eq!(origin_of(request), "http://localhost");
    }
}
