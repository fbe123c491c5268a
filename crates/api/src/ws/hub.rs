//! Transport-facing entry point for connection lifecycle.
//!
//! The WebSocket handler calls [`ConnectionHub::on_connect`] once after the
//! upgrade and [`ConnectionHub::on_disconnect`] once when the socket closes.
//! Between them the hub keeps three things in step:
//!
//! - the canonical in-process [`PresenceTracker`],
//! - the durable connection mirror (audit rows tagged with `instance_id`),
//! - the user's `last_active_at` and the platform presence events.
//!
//! Tracker updates and the platform events they produce go through one
//! ordering lock, so the bus sees presence changes in the order the tracker
//! applied them.
//!
//! Neither callback ever fails. Errors are logged at warn level and dropped;
//! the transport keeps running.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::sync::Mutex;
use uuid::Uuid;
use vigil_core::types::{ConnectionId, DbId, Timestamp};
use vigil_db::models::connection::CreateConnection;
use vigil_db::{ConnectionMirror, StoreError, UserDirectory};
use vigil_events::bus::{USER_CONNECTIONS_CHANGED, USER_OFFLINE, USER_ONLINE};
use vigil_events::{EventBus, PlatformEvent};

use crate::presence::tracker::{ConnectOutcome, DisconnectOutcome};
use crate::presence::{ConnectionRecord, PresenceError, PresenceTracker};

/// What the transport knows about a connection when it opens.
#[derive(Debug, Clone, Default)]
pub struct ConnectionContext {
    /// Authenticated owner, `None` for anonymous connections.
    pub user_id: Option<DbId>,
    pub ip_address: Option<String>,
    pub device_id: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Presence(#[from] PresenceError),
}

pub struct ConnectionHub {
    tracker: Arc<PresenceTracker>,
    mirror: Arc<dyn ConnectionMirror>,
    users: Arc<dyn UserDirectory>,
    event_bus: Arc<EventBus>,
    instance_id: String,
    publish_order: Mutex<()>,
}

impl ConnectionHub {
    pub fn new(
        tracker: Arc<PresenceTracker>,
        mirror: Arc<dyn ConnectionMirror>,
        users: Arc<dyn UserDirectory>,
        event_bus: Arc<EventBus>,
        instance_id: impl Into<String>,
    ) -> Self {
        Self {
            tracker,
            mirror,
            users,
            event_bus,
            instance_id: instance_id.into(),
            publish_order: Mutex::new(()),
        }
    }

    pub fn tracker(&self) -> &Arc<PresenceTracker> {
        &self.tracker
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Register a freshly opened connection and return its id.
    pub async fn on_connect(&self, context: ConnectionContext) -> ConnectionId {
        let connection_id = Uuid::new_v4().to_string();
        if let Err(e) = self.try_connect(&connection_id, context).await {
            tracing::warn!(conn_id = %connection_id, error = %e, "Connection bookkeeping failed");
        }
        connection_id
    }

    /// Deregister a closed connection. Unknown ids are ignored.
    pub async fn on_disconnect(&self, connection_id: &str) {
        if let Err(e) = self.try_disconnect(connection_id).await {
            tracing::warn!(conn_id = %connection_id, error = %e, "Disconnect bookkeeping failed");
        }
    }

    async fn try_connect(
        &self,
        connection_id: &str,
        context: ConnectionContext,
    ) -> Result<(), HubError> {
        let now = Utc::now();

        let mirrored = self
            .mirror
            .record_connect(&CreateConnection {
                connection_id: connection_id.to_string(),
                user_id: context.user_id,
                ip_address: context.ip_address.clone(),
                device_id: context.device_id.clone(),
                user_agent: context.user_agent.clone(),
                instance_id: self.instance_id.clone(),
                connected_at: now,
            })
            .await;

        let ordered = self.publish_order.lock().await;
        let outcome = self
            .tracker
            .connect(ConnectionRecord {
                connection_id: connection_id.to_string(),
                user_id: context.user_id,
                ip_address: context.ip_address,
                device_id: context.device_id,
                user_agent: context.user_agent,
                connected_at: now,
                active: true,
            })
            .await?;

        tracing::info!(
            conn_id = %connection_id,
            user_id = ?context.user_id,
            connections = outcome.connections,
            "Connection opened"
        );

        if let Some(user_id) = context.user_id {
            self.publish_connect(user_id, connection_id, outcome);
        }
        drop(ordered);

        // Presence is already updated; a lost mirror row is reported, not undone.
        let activity = match context.user_id {
            Some(user_id) => self.users.set_last_active_at(user_id, now).await,
            None => Ok(()),
        };

        mirrored?;
        activity?;
        Ok(())
    }

    async fn try_disconnect(&self, connection_id: &str) -> Result<(), HubError> {
        let now = Utc::now();

        let mirrored = self.mirror.record_disconnect(connection_id, now).await;

        let ordered = self.publish_order.lock().await;
        let Some(outcome) = self.tracker.disconnect(connection_id).await else {
            tracing::debug!(conn_id = %connection_id, "Disconnect for untracked connection");
            mirrored?;
            return Ok(());
        };

        tracing::info!(
            conn_id = %connection_id,
            user_id = ?outcome.record.user_id,
            remaining = outcome.remaining,
            "Connection closed"
        );

        if let Some(user_id) = outcome.record.user_id {
            self.publish_disconnect(user_id, connection_id, &outcome, now);
        }
        drop(ordered);

        let activity = match outcome.record.user_id {
            Some(user_id) => self.users.set_last_active_at(user_id, now).await,
            None => Ok(()),
        };

        mirrored?;
        activity?;
        Ok(())
    }

    fn publish_connect(&self, user_id: DbId, connection_id: &str, outcome: ConnectOutcome) {
        let event_type = if outcome.user_came_online {
            USER_ONLINE
        } else {
            USER_CONNECTIONS_CHANGED
        };
        self.event_bus.publish(
            PlatformEvent::new(event_type)
                .with_user(user_id)
                .with_payload(json!({
                    "connection_id": connection_id,
                    "connections": outcome.connections,
                })),
        );
    }

    fn publish_disconnect(
        &self,
        user_id: DbId,
        connection_id: &str,
        outcome: &DisconnectOutcome,
        at: Timestamp,
    ) {
        let event_type = if outcome.user_went_offline {
            USER_OFFLINE
        } else {
            USER_CONNECTIONS_CHANGED
        };
        self.event_bus.publish(
            PlatformEvent::new(event_type)
                .with_user(user_id)
                .with_payload(json!({
                    "connection_id": connection_id,
                    "connections": outcome.remaining,
                    "last_active_at": at,
                })),
        );
    }

    /// Disconnect every tracked connection. Used on graceful shutdown.
    pub async fn disconnect_all(&self) -> usize {
        let records = self.tracker.all_connections().await;
        for record in &records {
            self.on_disconnect(&record.connection_id).await;
        }
        tracing::info!(count = records.len(), "Disconnected all tracked connections");
        records.len()
    }

    /// Deactivate mirror rows this instance left active, e.g. after a crash.
    pub async fn sweep_stale_mirror(&self) -> Result<u64, StoreError> {
        let swept = self
            .mirror
            .deactivate_instance(&self.instance_id, Utc::now())
            .await?;
        if swept > 0 {
            tracing::info!(instance_id = %self.instance_id, swept, "Deactivated stale connection rows");
        }
        Ok(swept)
    }
}
