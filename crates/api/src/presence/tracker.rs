//! Online/offline edge detection over the connection registry.
//!
//! `connect` and `disconnect` run under one mutex so the "how many
//! connections does this user have" read and the insert/remove that follows
//! are a single step. Events are sent while the mutex is held, which fixes
//! their order for every subscriber:
//!
//! ```text
//! connect:     ClientConnected -> UserConnected       (second only on 0 -> 1)
//! disconnect:  UserDisconnected -> ClientDisconnected (first only on 1 -> 0)
//! ```
//!
//! By the time a subscriber sees `UserDisconnected`, the store already holds
//! zero connections for that user.

use tokio::sync::{broadcast, Mutex};
use vigil_core::types::{ConnectionId, DbId, Timestamp};

use super::store::PresenceStore;

/// Default buffer capacity of the presence event channel.
const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// One live transport connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRecord {
    pub connection_id: ConnectionId,
    /// `None` for anonymous connections.
    pub user_id: Option<DbId>,
    pub ip_address: Option<String>,
    pub device_id: Option<String>,
    pub user_agent: Option<String>,
    pub connected_at: Timestamp,
    pub active: bool,
}

/// Presence change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    /// Any connection opened.
    ClientConnected {
        connection_id: ConnectionId,
        user_id: Option<DbId>,
    },
    /// A user went from zero to one live connection.
    UserConnected { user_id: DbId },
    /// A user went from one to zero live connections.
    UserDisconnected { user_id: DbId },
    /// Any connection closed.
    ClientDisconnected {
        connection_id: ConnectionId,
        user_id: Option<DbId>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),
}

/// Result of a successful [`PresenceTracker::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOutcome {
    /// The connection flipped its user from offline to online.
    pub user_came_online: bool,
    /// Live connections for the user after the insert (0 when anonymous).
    pub connections: usize,
}

/// Result of a [`PresenceTracker::disconnect`] that removed a connection.
#[derive(Debug, Clone)]
pub struct DisconnectOutcome {
    pub record: ConnectionRecord,
    /// The connection was the user's last one.
    pub user_went_offline: bool,
    /// Live connections left for the user (0 when anonymous).
    pub remaining: usize,
}

/// Tracks which users are online in this process.
///
/// Sole owner of its [`PresenceStore`]; nothing else mutates it.
pub struct PresenceTracker {
    store: PresenceStore<ConnectionRecord>,
    write_lock: Mutex<()>,
    events: broadcast::Sender<PresenceEvent>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create a tracker whose event channel buffers `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self {
            store: PresenceStore::new(),
            write_lock: Mutex::new(()),
            events,
        }
    }

    /// Register an observer. It sees every event sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<PresenceEvent> {
        self.events.subscribe()
    }

    /// Register a connection.
    ///
    /// Emits `ClientConnected`, then `UserConnected` if the user had no live
    /// connection before this one.
    pub async fn connect(&self, record: ConnectionRecord) -> Result<ConnectOutcome, PresenceError> {
        let _guard = self.write_lock.lock().await;

        if self.store.try_get(&record.connection_id).await.is_some() {
            return Err(PresenceError::DuplicateConnection(record.connection_id));
        }

        let user_id = record.user_id;
        let connection_id = record.connection_id.clone();
        let before = match user_id {
            Some(uid) => self.count_for(uid).await,
            None => 0,
        };

        self.store
            .add(
                connection_id.clone(),
                ConnectionRecord {
                    active: true,
                    ..record
                },
            )
            .await;

        self.emit(PresenceEvent::ClientConnected {
            connection_id,
            user_id,
        });

        let user_came_online = user_id.is_some() && before == 0;
        if let (true, Some(uid)) = (user_came_online, user_id) {
            self.emit(PresenceEvent::UserConnected { user_id: uid });
        }

        Ok(ConnectOutcome {
            user_came_online,
            connections: if user_id.is_some() { before + 1 } else { 0 },
        })
    }

    /// Deregister a connection. Unknown ids are ignored and emit nothing.
    ///
    /// Emits `UserDisconnected` first if this was the user's last connection,
    /// then `ClientDisconnected`.
    pub async fn disconnect(&self, connection_id: &str) -> Option<DisconnectOutcome> {
        let _guard = self.write_lock.lock().await;

        let mut record = self.store.remove(connection_id).await?;
        record.active = false;

        let remaining = match record.user_id {
            Some(uid) => self.count_for(uid).await,
            None => 0,
        };

        let user_went_offline = record.user_id.is_some() && remaining == 0;
        if let (true, Some(uid)) = (user_went_offline, record.user_id) {
            self.emit(PresenceEvent::UserDisconnected { user_id: uid });
        }

        self.emit(PresenceEvent::ClientDisconnected {
            connection_id: record.connection_id.clone(),
            user_id: record.user_id,
        });

        Some(DisconnectOutcome {
            record,
            user_went_offline,
            remaining,
        })
    }

    /// A user is online iff at least one live connection carries their id.
    pub async fn is_online(&self, user_id: DbId) -> bool {
        self.count_for(user_id).await > 0
    }

    pub async fn connections_of(&self, user_id: DbId) -> Vec<ConnectionRecord> {
        self.store
            .get_all()
            .await
            .into_iter()
            .filter(|r| r.active && r.user_id == Some(user_id))
            .collect()
    }

    pub async fn connection_count(&self, user_id: DbId) -> usize {
        self.count_for(user_id).await
    }

    /// Ids of every user with at least one live connection, ascending.
    pub async fn online_users(&self) -> Vec<DbId> {
        let mut users: Vec<DbId> = self
            .store
            .get_all()
            .await
            .into_iter()
            .filter(|r| r.active)
            .filter_map(|r| r.user_id)
            .collect();
        users.sort_unstable();
        users.dedup();
        users
    }

    /// Snapshot of every live connection, anonymous ones included.
    pub async fn all_connections(&self) -> Vec<ConnectionRecord> {
        self.store.get_all().await
    }

    async fn count_for(&self, user_id: DbId) -> usize {
        self.store
            .get_all()
            .await
            .iter()
            .filter(|r| r.active && r.user_id == Some(user_id))
            .count()
    }

    fn emit(&self, event: PresenceEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("Presence event dropped, no subscribers");
        }
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}
