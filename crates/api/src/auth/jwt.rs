//! JWT access- and refresh-token encoding.
//!
//! Both tokens are HS256-signed with the same secret. Access tokens carry an
//! [`AccessClaims`] payload including the user's security stamp at issue
//! time. Refresh tokens carry only [`RefreshClaims`] (id, issue time, expiry);
//! the server finds their owner through the stored SHA-256 fingerprint.

use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vigil_core::rejection::RejectReason;
use vigil_core::types::{DbId, Timestamp};

/// JWT claims embedded in every access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    /// Subject -- the user's internal database id.
    pub sub: DbId,
    /// Unique token identifier (UUID v4); makes every token hash distinct.
    pub jti: String,
    pub iss: String,
    pub aud: String,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// The user's security stamp when the token was minted.
    pub stamp: String,
}

/// Claims of a refresh token. Deliberately subject-free.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshClaims {
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issuer/audience pair stamped into and checked against access tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenOrigin {
    pub issuer: String,
    pub audience: String,
}

/// Configuration for token signing and lifetimes.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub secret: String,
    /// Access token lifetime in minutes (default: 15).
    pub access_token_expiry_mins: i64,
    /// Refresh token lifetime in days (default: 7).
    pub refresh_token_expiry_days: i64,
    /// Fixed `iss` claim. Falls back to the request origin when `None`.
    pub issuer: Option<String>,
    /// Fixed `aud` claim. Falls back to the request origin when `None`.
    pub audience: Option<String>,
}

/// Default access token expiry in minutes.
const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;
/// Default refresh token expiry in days.
const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 7;
/// Shortest secret accepted for HS256.
pub const MIN_SECRET_LEN: usize = 32;

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var                    | Required | Default          |
    /// |----------------------------|----------|------------------|
    /// | `JWT_SECRET`               | **yes**  | --               |
    /// | `JWT_ACCESS_EXPIRY_MINS`   | no       | `15`             |
    /// | `JWT_REFRESH_EXPIRY_DAYS`  | no       | `7`              |
    /// | `JWT_ISSUER`               | no       | request origin   |
    /// | `JWT_AUDIENCE`             | no       | request origin   |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is unset or shorter than [`MIN_SECRET_LEN`]
    /// bytes, or if a lifetime is not a positive integer.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(
            secret.len() >= MIN_SECRET_LEN,
            "JWT_SECRET must be at least {MIN_SECRET_LEN} bytes"
        );

        let access_token_expiry_mins: i64 = std::env::var("JWT_ACCESS_EXPIRY_MINS")
            .unwrap_or_else(|_| DEFAULT_ACCESS_EXPIRY_MINS.to_string())
            .parse()
            .expect("JWT_ACCESS_EXPIRY_MINS must be a valid i64");
        assert!(access_token_expiry_mins > 0, "JWT_ACCESS_EXPIRY_MINS must be positive");

        let refresh_token_expiry_days: i64 = std::env::var("JWT_REFRESH_EXPIRY_DAYS")
            .unwrap_or_else(|_| DEFAULT_REFRESH_EXPIRY_DAYS.to_string())
            .parse()
            .expect("JWT_REFRESH_EXPIRY_DAYS must be a valid i64");
        assert!(refresh_token_expiry_days > 0, "JWT_REFRESH_EXPIRY_DAYS must be positive");

        Self {
            secret,
            access_token_expiry_mins,
            refresh_token_expiry_days,
            issuer: non_empty_env("JWT_ISSUER"),
            audience: non_empty_env("JWT_AUDIENCE"),
        }
    }

    /// Resolve the issuer/audience for a request arriving at `request_origin`
    /// (e.g. `https://api.example.com`).
    pub fn origin_for(&self, request_origin: &str) -> TokenOrigin {
        TokenOrigin {
            issuer: self
                .issuer
                .clone()
                .unwrap_or_else(|| request_origin.to_string()),
            audience: self
                .audience
                .clone()
                .unwrap_or_else(|| request_origin.to_string()),
        }
    }

    pub fn access_ttl(&self) -> Duration {
        Duration::minutes(self.access_token_expiry_mins)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::days(self.refresh_token_expiry_days)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A freshly signed token together with its decoded expiry.
#[derive(Debug, Clone)]
pub struct SignedToken<C> {
    pub token: String,
    pub claims: C,
    pub expires_at: Timestamp,
}

/// Sign an access token for `user_id` carrying the user's current stamp.
pub fn generate_access_token(
    user_id: DbId,
    security_stamp: &str,
    origin: &TokenOrigin,
    config: &JwtConfig,
    now: Timestamp,
) -> Result<SignedToken<AccessClaims>, jsonwebtoken::errors::Error> {
    let expires_at = now + config.access_ttl();
    let claims = AccessClaims {
        sub: user_id,
        jti: Uuid::new_v4().to_string(),
        iss: origin.issuer.clone(),
        aud: origin.audience.clone(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
        stamp: security_stamp.to_string(),
    };

    let token = encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;

    Ok(SignedToken {
        token,
        claims,
        expires_at,
    })
}

/// Sign a subject-free refresh token.
pub fn generate_refresh_token(
    config: &JwtConfig,
    now: Timestamp,
) -> Result<SignedToken<RefreshClaims>, jsonwebtoken::errors::Error> {
    let expires_at = now + config.refresh_ttl();
    let claims = RefreshClaims {
        jti: Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;

    Ok(SignedToken {
        token,
        claims,
        expires_at,
    })
}

/// Verify signature, expiry, issuer and audience of an access token.
pub fn decode_access_token(
    token: &str,
    origin: &TokenOrigin,
    config: &JwtConfig,
) -> Result<AccessClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default(); // HS256, validates exp
    validation.set_issuer(&[&origin.issuer]);
    validation.set_audience(&[&origin.audience]);

    let data = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

/// Verify signature and expiry of a refresh token.
pub fn decode_refresh_token(
    token: &str,
    config: &JwtConfig,
) -> Result<RefreshClaims, jsonwebtoken::errors::Error> {
    let data = decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Map a decode failure onto the reason recorded in logs.
pub fn rejection_for(err: &jsonwebtoken::errors::Error) -> RejectReason {
    match err.kind() {
        ErrorKind::ExpiredSignature => RejectReason::Expired,
        _ => RejectReason::Malformed,
    }
}
