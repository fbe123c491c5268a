//! Hashed token pair model.

use sqlx::FromRow;
use vigil_core::types::{DbId, Timestamp};

/// A row from the `token_records` table.
///
/// Never updated in place. Rotation creates a replacement and removes this
/// row in the same unit of work.
#[derive(Debug, Clone, FromRow)]
pub struct TokenRecord {
    pub id: DbId,
    pub user_id: DbId,
    pub access_token_hash: String,
    pub refresh_token_hash: String,
    pub access_token_expires_at: Timestamp,
    pub refresh_token_expires_at: Timestamp,
    /// The owner's security stamp when the pair was minted.
    pub security_stamp: String,
    pub created_at: Timestamp,
}

impl TokenRecord {
    /// True when either expiry is at or before `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.access_token_expires_at <= now || self.refresh_token_expires_at <= now
    }
}

/// DTO for inserting a new token record.
#[derive(Debug, Clone)]
pub struct CreateTokenRecord {
    pub user_id: DbId,
    pub access_token_hash: String,
    pub refresh_token_hash: String,
    pub access_token_expires_at: Timestamp,
    pub refresh_token_expires_at: Timestamp,
    pub security_stamp: String,
}
