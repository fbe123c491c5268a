//! Repository for the `connections` table (durable connection mirror).

use sqlx::PgPool;
use vigil_core::types::Timestamp;

use crate::models::connection::{ConnectionRow, CreateConnection};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, connection_id, user_id, ip_address, device_id, user_agent, \
                        instance_id, is_active, connected_at, disconnected_at";

/// Provides writes for mirrored connections.
pub struct ConnectionRepo;

impl ConnectionRepo {
    /// Insert a new active connection row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateConnection,
    ) -> Result<ConnectionRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO connections
                (connection_id, user_id, ip_address, device_id, user_agent,
                 instance_id, connected_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ConnectionRow>(&query)
            .bind(&input.connection_id)
            .bind(input.user_id)
            .bind(&input.ip_address)
            .bind(&input.device_id)
            .bind(&input.user_agent)
            .bind(&input.instance_id)
            .bind(input.connected_at)
            .fetch_one(pool)
            .await
    }

    /// Mark an active connection inactive. Returns `true` if a row changed.
    pub async fn mark_inactive(
        pool: &PgPool,
        connection_id: &str,
        at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE connections SET is_active = false, disconnected_at = $2
             WHERE connection_id = $1 AND is_active = true",
        )
        .bind(connection_id)
        .bind(at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark every active row owned by `instance_id` inactive.
    ///
    /// Run at startup: rows still active for this instance belong to sockets
    /// that died with the previous process.
    pub async fn deactivate_instance(
        pool: &PgPool,
        instance_id: &str,
        at: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE connections SET is_active = false, disconnected_at = $2
             WHERE instance_id = $1 AND is_active = true",
        )
        .bind(instance_id)
        .bind(at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
