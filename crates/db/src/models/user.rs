//! User projection owned by the user directory.

use sqlx::FromRow;
use vigil_core::types::{DbId, Timestamp};

/// A row from the `users` table.
///
/// Contains the password hash -- never serialize this to API responses.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub username: String,
    pub password_hash: String,
    /// Opaque version marker, rotated on every security-sensitive change.
    pub security_stamp: String,
    pub is_active: bool,
    pub last_active_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new user.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub password_hash: String,
}
