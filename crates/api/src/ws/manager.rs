use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};
use vigil_core::types::{DbId, Timestamp};
use vigil_events::PlatformEvent;

/// Channel sender half for pushing frames to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Outbound side of a single WebSocket connection.
pub struct WsConnection {
    /// `None` for anonymous connections.
    pub user_id: Option<DbId>,
    pub sender: WsSender,
    pub connected_at: Timestamp,
}

/// Outbound frame routing for every open WebSocket on this instance.
///
/// Presence bookkeeping lives in the connection hub; this type only knows
/// where to write frames.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection's outbound channel.
    ///
    /// Returns the receiver half so the socket task can forward frames to
    /// the sink.
    pub async fn add(
        &self,
        conn_id: String,
        user_id: Option<DbId>,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            user_id,
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Send a frame to every connection with an authenticated owner.
    /// Closed channels are skipped; their socket task removes them on exit.
    async fn broadcast_authenticated(&self, message: Message) -> usize {
        let conns = self.connections.read().await;
        conns
            .values()
            .filter(|conn| conn.user_id.is_some())
            .filter(|conn| conn.sender.send(message.clone()).is_ok())
            .count()
    }

    /// Push a platform event as a JSON text frame to every authenticated
    /// connection. Anonymous sockets never see user ids.
    pub async fn broadcast_event(&self, event: &PlatformEvent) -> usize {
        match event_frame(event) {
            Some(frame) => self.broadcast_authenticated(frame).await,
            None => 0,
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then forget them all.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connection.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Wire shape of a pushed event: `{"type":"event","event_type":...}`.
fn event_frame(event: &PlatformEvent) -> Option<Message> {
    let body = serde_json::json!({
        "type": "event",
        "event_type": event.event_type,
        "user_id": event.user_id,
        "payload": event.payload,
        "timestamp": event.timestamp,
    });
    match serde_json::to_string(&body) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            tracing::error!(error = %e, event_type = %event.event_type, "Failed to encode event frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_events::bus::USER_ONLINE;

    #[tokio::test]
    async fn events_skip_anonymous_connections() {
        let manager = WsManager::new();
        let mut a = manager.add("a".into(), Some(1)).await;
        let mut b = manager.add("b".into(), Some(2)).await;
        let mut anon = manager.add("anon".into(), None).await;

        let sent = manager
            .broadcast_event(&PlatformEvent::new(USER_ONLINE).with_user(1))
            .await;
        assert_eq!(sent, 2);
        assert!(a.try_recv().is_ok());
        assert!(b.try_recv().is_ok());
        assert!(anon.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_event_serializes_json() {
        let manager = WsManager::new();
        let mut rx = manager.add("a".into(), Some(4)).await;

        let event = PlatformEvent::new(USER_ONLINE).with_user(9);
        assert_eq!(manager.broadcast_event(&event).await, 1);

        let Message::Text(text) = rx.try_recv().unwrap() else {
            panic!("expected a text frame");
        };
        let json: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["event_type"], USER_ONLINE);
        assert_eq!(json["user_id"], 9);
    }

    #[tokio::test]
    async fn shutdown_sends_close_and_clears() {
        let manager = WsManager::new();
        let mut rx = manager.add("a".into(), Some(1)).await;

        manager.shutdown_all().await;

        assert!(matches!(rx.try_recv().unwrap(), Message::Close(None)));
        assert_eq!(manager.connection_count().await, 0);
    }
}
