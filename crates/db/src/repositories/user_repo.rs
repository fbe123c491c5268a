//! Repository for the `users` table.
//!
//! A password change also rotates `security_stamp`, which invalidates every
//! outstanding token for that user without touching `token_records`.

use sqlx::PgPool;
use vigil_core::types::{DbId, Timestamp};

use crate::models::user::User;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, username, password_hash, security_stamp, is_active, \
                        last_active_at, created_at, updated_at";

/// Generate a fresh opaque security stamp.
pub fn new_security_stamp() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Provides the user reads and writes the session service needs.
pub struct UserRepo;

impl UserRepo {
    /// Find a user by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by username (case-sensitive).
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE username = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    /// Read only the current security stamp.
    pub async fn get_security_stamp(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as("SELECT security_stamp FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|(stamp,)| stamp))
    }

    /// Record the last time the user was seen. Returns `true` if a row was updated.
    pub async fn set_last_active_at(
        pool: &PgPool,
        id: DbId,
        at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET last_active_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the password hash and rotate the security stamp.
    pub async fn update_password(
        pool: &PgPool,
        id: DbId,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, security_stamp = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .bind(new_security_stamp())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
