//! Capability traits the session service is written against.
//!
//! The service never names a database type. It depends on these three
//! traits, implemented for PostgreSQL in [`crate::pg`] and in memory in
//! [`crate::memory`].

use async_trait::async_trait;
use vigil_core::types::{DbId, Timestamp};

use crate::models::connection::{ConnectionRow, CreateConnection};
use crate::models::token_record::{CreateTokenRecord, TokenRecord};
use crate::models::user::User;

/// Error returned by any store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The SQL backend failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A non-SQL backend could not serve the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable table of hashed token pairs.
///
/// No business rules live here. Only CRUD, predicate queries and the one
/// atomic rotation unit.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert a new record.
    async fn insert(&self, input: &CreateTokenRecord) -> StoreResult<TokenRecord>;

    /// Record matching `hash` whose two expiries are both after `now`.
    async fn find_active_by_access_hash(
        &self,
        hash: &str,
        now: Timestamp,
    ) -> StoreResult<Option<TokenRecord>>;

    /// Record matching a refresh hash, expired or not.
    async fn find_by_refresh_hash(&self, hash: &str) -> StoreResult<Option<TokenRecord>>;

    /// Atomically delete `old_id` and insert `replacement`.
    ///
    /// Returns `None` without writing when `old_id` is already gone.
    async fn rotate(
        &self,
        old_id: DbId,
        replacement: &CreateTokenRecord,
    ) -> StoreResult<Option<TokenRecord>>;

    /// Delete the user's record with the given refresh hash.
    async fn delete_by_refresh_hash(&self, user_id: DbId, hash: &str) -> StoreResult<u64>;

    /// Delete every record for a user.
    async fn delete_all_for_user(&self, user_id: DbId) -> StoreResult<u64>;

    /// Delete the user's records with either expiry at or before `now`.
    async fn delete_expired_for_user(&self, user_id: DbId, now: Timestamp) -> StoreResult<u64>;

    /// Delete every record whose refresh expiry is at or before `now`.
    async fn delete_expired(&self, now: Timestamp) -> StoreResult<u64>;

    /// Cheap reachability check for health reporting.
    async fn ping(&self) -> StoreResult<()>;
}

/// The user directory as seen by the session service.
///
/// The session service reads stamps and writes `last_active_at`. Password
/// changes are the directory's own operation; implementations must rotate
/// the security stamp whenever they apply one.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_by_id(&self, id: DbId) -> StoreResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn get_security_stamp(&self, id: DbId) -> StoreResult<Option<String>>;

    async fn set_last_active_at(&self, id: DbId, at: Timestamp) -> StoreResult<()>;

    /// Replace the password hash, rotating the security stamp.
    /// Returns `false` if the user does not exist.
    async fn update_password(&self, id: DbId, password_hash: &str) -> StoreResult<bool>;
}

/// Durable mirror of transport connections.
#[async_trait]
pub trait ConnectionMirror: Send + Sync {
    async fn record_connect(&self, input: &CreateConnection) -> StoreResult<ConnectionRow>;

    /// Mark a connection inactive. Returns `false` if no active row matched.
    async fn record_disconnect(&self, connection_id: &str, at: Timestamp) -> StoreResult<bool>;

    /// Deactivate every active row owned by an instance.
    async fn deactivate_instance(&self, instance_id: &str, at: Timestamp) -> StoreResult<u64>;
}
