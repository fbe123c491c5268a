//! Token pair issuance, validation, rotation and invalidation.
//!
//! [`TokenIssuer`] is the only writer of the token store. Raw tokens leave
//! this module exactly once, inside a [`TokenPair`]; only their SHA-256
//! fingerprints are persisted.
//!
//! A token is valid while all three hold:
//!
//! 1. its signature, expiry, issuer and audience check out,
//! 2. a stored record with its fingerprint exists and neither of the
//!    record's expiries has passed,
//! 3. the [`SecurityStampGuard`] accepts it against the live user record.
//!
//! Every failure surfaces as [`AuthError::Rejected`]; the carried
//! [`RejectReason`] is for logs only.
//!
//! Each record keeps the security stamp the pair was minted under. A refresh
//! token whose record carries a stamp other than the user's live one is
//! refused, so a stamp rotation retires refresh tokens as well.
//!
//! Rotation revokes the superseded pair immediately: the old record is
//! deleted in the same unit of work that inserts its replacement, so the old
//! access token fails check 2 from that moment on.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use vigil_core::hashing::hash_token;
use vigil_core::rejection::RejectReason;
use vigil_core::types::{DbId, Timestamp};
use vigil_db::models::token_record::CreateTokenRecord;
use vigil_db::models::user::User;
use vigil_db::{StoreError, TokenStore, UserDirectory};

use crate::auth::jwt::{self, AccessClaims, JwtConfig, TokenOrigin};
use crate::auth::stamp::SecurityStampGuard;

/// `token_type` value of every session response.
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Session response returned on sign-in and refresh.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub access_token_expires_at: Timestamp,
    pub refresh_token: String,
    pub refresh_token_expires_at: Timestamp,
    pub token_type: &'static str,
}

/// The outcome of a successful [`TokenIssuer::validate`].
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub user: User,
    pub claims: AccessClaims,
    /// Id of the stored record backing the token.
    pub record_id: DbId,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The credential was refused. The reason must not reach the caller.
    #[error("credential rejected ({0})")]
    Rejected(RejectReason),

    /// The token or user store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Signing a new token failed.
    #[error("token signing failed: {0}")]
    Signing(jsonwebtoken::errors::Error),

    /// The originating request went away before the operation finished.
    #[error("operation cancelled")]
    Cancelled,
}

impl AuthError {
    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            AuthError::Rejected(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Run `op` unless `cancel` fires first.
///
/// When cancellation wins, `op` is dropped before completion. Store
/// implementations only commit at the end of a unit of work, so a dropped
/// rotation leaves the old record in place and no new one behind.
async fn cancellable<T>(
    cancel: &CancellationToken,
    op: impl Future<Output = Result<T, AuthError>>,
) -> Result<T, AuthError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(AuthError::Cancelled),
        result = op => result,
    }
}

/// Mints, checks and retires token pairs.
pub struct TokenIssuer {
    config: JwtConfig,
    guard: SecurityStampGuard,
    store: Arc<dyn TokenStore>,
    users: Arc<dyn UserDirectory>,
}

impl TokenIssuer {
    pub fn new(
        config: JwtConfig,
        guard: SecurityStampGuard,
        store: Arc<dyn TokenStore>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            config,
            guard,
            store,
            users,
        }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Mint a pair for `user` and persist its fingerprints.
    ///
    /// Nothing is returned unless the record was stored.
    pub async fn issue(
        &self,
        user: &User,
        origin: &TokenOrigin,
        cancel: &CancellationToken,
    ) -> Result<TokenPair, AuthError> {
        cancellable(cancel, async {
            let (pair, record) = self.mint(user, origin, Utc::now())?;
            let stored = self.store.insert(&record).await?;
            tracing::info!(user_id = user.id, record_id = stored.id, "Issued token pair");
            Ok::<_, AuthError>(pair)
        })
        .await
    }

    /// Check an access token against signature, store and security stamp.
    pub async fn validate(
        &self,
        access_token: &str,
        origin: &TokenOrigin,
        cancel: &CancellationToken,
    ) -> Result<AuthenticatedSession, AuthError> {
        let result = cancellable(cancel, self.validate_inner(access_token, origin)).await;
        if let Err(AuthError::Rejected(reason)) = &result {
            match reason {
                RejectReason::StaleSession | RejectReason::Inactive => {
                    tracing::info!(reason = %reason, "Access token rejected");
                }
                _ => tracing::debug!(reason = %reason, "Access token rejected"),
            }
        }
        result
    }

    /// Boolean form of [`validate`](Self::validate). Store failures count as
    /// invalid.
    pub async fn is_valid(
        &self,
        access_token: &str,
        origin: &TokenOrigin,
        cancel: &CancellationToken,
    ) -> bool {
        self.validate(access_token, origin, cancel).await.is_ok()
    }

    async fn validate_inner(
        &self,
        access_token: &str,
        origin: &TokenOrigin,
    ) -> Result<AuthenticatedSession, AuthError> {
        let claims = jwt::decode_access_token(access_token, origin, &self.config)
            .map_err(|e| AuthError::Rejected(jwt::rejection_for(&e)))?;

        let now = Utc::now();
        let record = self
            .store
            .find_active_by_access_hash(&hash_token(access_token), now)
            .await?
            .ok_or(AuthError::Rejected(RejectReason::Revoked))?;

        if record.user_id != claims.sub {
            tracing::warn!(
                record_id = record.id,
                claimed_sub = claims.sub,
                "Token record owner does not match subject claim"
            );
            return Err(AuthError::Rejected(RejectReason::Malformed));
        }

        let user = self
            .users
            .get_by_id(claims.sub)
            .await?
            .ok_or(AuthError::Rejected(RejectReason::UnknownUser))?;

        self.guard
            .check(&claims, &user)
            .map_err(AuthError::Rejected)?;

        self.guard
            .touch_activity(self.users.as_ref(), &user, now)
            .await;

        Ok(AuthenticatedSession {
            user,
            claims,
            record_id: record.id,
        })
    }

    /// Exchange a refresh token for a new pair, retiring the old record in
    /// the same unit of work.
    ///
    /// A refresh token can be exchanged at most once. When two requests race
    /// on the same token, the loser finds its record already consumed and is
    /// rejected.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        origin: &TokenOrigin,
        cancel: &CancellationToken,
    ) -> Result<TokenPair, AuthError> {
        let result = cancellable(cancel, self.refresh_inner(refresh_token, origin)).await;
        if let Err(AuthError::Rejected(reason)) = &result {
            tracing::info!(reason = %reason, "Refresh token rejected");
        }
        result
    }

    async fn refresh_inner(
        &self,
        refresh_token: &str,
        origin: &TokenOrigin,
    ) -> Result<TokenPair, AuthError> {
        jwt::decode_refresh_token(refresh_token, &self.config)
            .map_err(|e| AuthError::Rejected(jwt::rejection_for(&e)))?;

        let now = Utc::now();
        let old = self
            .store
            .find_by_refresh_hash(&hash_token(refresh_token))
            .await?
            .ok_or(AuthError::Rejected(RejectReason::Revoked))?;

        if old.refresh_token_expires_at <= now {
            return Err(AuthError::Rejected(RejectReason::Expired));
        }

        let user = self
            .users
            .get_by_id(old.user_id)
            .await?
            .ok_or(AuthError::Rejected(RejectReason::UnknownUser))?;
        if !user.is_active {
            return Err(AuthError::Rejected(RejectReason::Inactive));
        }
        if old.security_stamp != user.security_stamp {
            return Err(AuthError::Rejected(RejectReason::StaleSession));
        }

        let (pair, replacement) = self.mint(&user, origin, now)?;
        let stored = self
            .store
            .rotate(old.id, &replacement)
            .await?
            .ok_or(AuthError::Rejected(RejectReason::Revoked))?;

        tracing::info!(
            user_id = user.id,
            old_record_id = old.id,
            record_id = stored.id,
            "Rotated token pair"
        );
        Ok(pair)
    }

    /// Retire a user's token records.
    ///
    /// - `refresh_token` given: that record is removed.
    /// - `allow_multiple == false`: every record of the user is removed.
    /// - Always: the user's records with either expiry in the past are removed.
    ///
    /// Returns the number of records removed.
    pub async fn invalidate(
        &self,
        user_id: DbId,
        refresh_token: Option<&str>,
        allow_multiple: bool,
        cancel: &CancellationToken,
    ) -> Result<u64, AuthError> {
        cancellable(cancel, async {
            let mut removed = 0;
            if let Some(token) = refresh_token {
                removed += self
                    .store
                    .delete_by_refresh_hash(user_id, &hash_token(token))
                    .await?;
            }
            if !allow_multiple {
                removed += self.store.delete_all_for_user(user_id).await?;
            }
            removed += self
                .store
                .delete_expired_for_user(user_id, Utc::now())
                .await?;

            tracing::info!(user_id, removed, allow_multiple, "Invalidated token records");
            Ok::<_, AuthError>(removed)
        })
        .await
    }

    /// Remove every record whose refresh expiry has passed.
    pub async fn sweep_expired(&self, cancel: &CancellationToken) -> Result<u64, AuthError> {
        cancellable(cancel, async {
            Ok::<_, AuthError>(self.store.delete_expired(Utc::now()).await?)
        })
        .await
    }

    /// Whether the token store is reachable.
    pub async fn store_healthy(&self) -> bool {
        self.store.ping().await.is_ok()
    }

    fn mint(
        &self,
        user: &User,
        origin: &TokenOrigin,
        now: Timestamp,
    ) -> Result<(TokenPair, CreateTokenRecord), AuthError> {
        let access = jwt::generate_access_token(
            user.id,
            &user.security_stamp,
            origin,
            &self.config,
            now,
        )
        .map_err(AuthError::Signing)?;
        let refresh = jwt::generate_refresh_token(&self.config, now).map_err(AuthError::Signing)?;

        let record = CreateTokenRecord {
            user_id: user.id,
            access_token_hash: hash_token(&access.token),
            refresh_token_hash: hash_token(&refresh.token),
            access_token_expires_at: access.expires_at,
            refresh_token_expires_at: refresh.expires_at,
            security_stamp: user.security_stamp.clone(),
        };

        let pair = TokenPair {
            access_token: access.token,
            access_token_expires_at: access.expires_at,
            refresh_token: refresh.token,
            refresh_token_expires_at: refresh.expires_at,
            token_type: TOKEN_TYPE_BEARER,
        };

        Ok((pair, record))
    }
}
