//! Repository for the `token_records` table.

use sqlx::PgPool;
use vigil_core::types::{DbId, Timestamp};

use crate::models::token_record::{CreateTokenRecord, TokenRecord};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, user_id, access_token_hash, refresh_token_hash, \
                        access_token_expires_at, refresh_token_expires_at, \
                        security_stamp, created_at";

/// Provides CRUD and rotation for hashed token pairs.
pub struct TokenRepo;

impl TokenRepo {
    /// Insert a new token record, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateTokenRecord,
    ) -> Result<TokenRecord, sqlx::Error> {
        let query = format!(
            "INSERT INTO token_records
                (user_id, access_token_hash, refresh_token_hash,
                 access_token_expires_at, refresh_token_expires_at, security_stamp)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TokenRecord>(&query)
            .bind(input.user_id)
            .bind(&input.access_token_hash)
            .bind(&input.refresh_token_hash)
            .bind(input.access_token_expires_at)
            .bind(input.refresh_token_expires_at)
            .bind(&input.security_stamp)
            .fetch_one(pool)
            .await
    }

    /// Find a record by access hash whose access and refresh expiries are
    /// both still in the future relative to `now`.
    pub async fn find_active_by_access_hash(
        pool: &PgPool,
        hash: &str,
        now: Timestamp,
    ) -> Result<Option<TokenRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM token_records
             WHERE access_token_hash = $1
               AND access_token_expires_at > $2
               AND refresh_token_expires_at > $2"
        );
        sqlx::query_as::<_, TokenRecord>(&query)
            .bind(hash)
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// Find a record by refresh hash regardless of expiry.
    ///
    /// The caller decides whether an expired match is a rejection, so the
    /// distinction between "expired" and "revoked" survives into the logs.
    pub async fn find_by_refresh_hash(
        pool: &PgPool,
        hash: &str,
    ) -> Result<Option<TokenRecord>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM token_records WHERE refresh_token_hash = $1");
        sqlx::query_as::<_, TokenRecord>(&query)
            .bind(hash)
            .fetch_optional(pool)
            .await
    }

    /// Replace record `old_id` with a new record in one transaction.
    ///
    /// Returns `None` (and writes nothing) when `old_id` no longer exists,
    /// which is what a second concurrent refresh of the same token observes.
    pub async fn rotate(
        pool: &PgPool,
        old_id: DbId,
        replacement: &CreateTokenRecord,
    ) -> Result<Option<TokenRecord>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM token_records WHERE id = $1")
            .bind(old_id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            tracing::debug!(old_id, "Rotation target already consumed");
            return Ok(None);
        }

        let query = format!(
            "INSERT INTO token_records
                (user_id, access_token_hash, refresh_token_hash,
                 access_token_expires_at, refresh_token_expires_at, security_stamp)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        let record = sqlx::query_as::<_, TokenRecord>(&query)
            .bind(replacement.user_id)
            .bind(&replacement.access_token_hash)
            .bind(&replacement.refresh_token_hash)
            .bind(replacement.access_token_expires_at)
            .bind(replacement.refresh_token_expires_at)
            .bind(&replacement.security_stamp)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(record))
    }

    /// Delete the record for `user_id` matching a refresh hash. Returns the
    /// number of deleted rows.
    pub async fn delete_by_refresh_hash(
        pool: &PgPool,
        user_id: DbId,
        hash: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM token_records WHERE user_id = $1 AND refresh_token_hash = $2",
        )
        .bind(user_id)
        .bind(hash)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete every record belonging to a user.
    pub async fn delete_all_for_user(pool: &PgPool, user_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM token_records WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete a user's records whose access or refresh expiry has passed.
    pub async fn delete_expired_for_user(
        pool: &PgPool,
        user_id: DbId,
        now: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM token_records
             WHERE user_id = $1
               AND (access_token_expires_at <= $2 OR refresh_token_expires_at <= $2)",
        )
        .bind(user_id)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete every record whose refresh expiry has passed.
    ///
    /// Access-expired rows are kept here because their refresh token can
    /// still mint a new pair.
    pub async fn delete_expired(pool: &PgPool, now: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM token_records WHERE refresh_token_expires_at <= $1")
            .bind(now)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
