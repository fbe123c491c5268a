//! Durable connection mirror model.

use sqlx::FromRow;
use vigil_core::types::{DbId, Timestamp};

/// A row from the `connections` table.
#[derive(Debug, Clone, FromRow)]
pub struct ConnectionRow {
    pub id: DbId,
    pub connection_id: String,
    pub user_id: Option<DbId>,
    pub ip_address: Option<String>,
    pub device_id: Option<String>,
    pub user_agent: Option<String>,
    /// Server process slot that owns the live socket.
    pub instance_id: String,
    pub is_active: bool,
    pub connected_at: Timestamp,
    pub disconnected_at: Option<Timestamp>,
}

/// DTO for recording a newly opened connection.
#[derive(Debug, Clone)]
pub struct CreateConnection {
    pub connection_id: String,
    pub user_id: Option<DbId>,
    pub ip_address: Option<String>,
    pub device_id: Option<String>,
    pub user_agent: Option<String>,
    pub instance_id: String,
    pub connected_at: Timestamp,
}
