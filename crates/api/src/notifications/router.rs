//! Event-to-client routing.
//!
//! [`NotificationRouter`] subscribes to the platform event bus and pushes
//! presence changes to every authenticated WebSocket as JSON text frames.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use vigil_events::bus::{USER_CONNECTIONS_CHANGED, USER_OFFLINE, USER_ONLINE};
use vigil_events::PlatformEvent;

use crate::ws::WsManager;

pub struct NotificationRouter {
    ws_manager: Arc<WsManager>,
}

impl NotificationRouter {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run the routing loop until `cancel` fires or the
    /// [`EventBus`](vigil_events::EventBus) is dropped.
    pub async fn run(
        self,
        mut receiver: broadcast::Receiver<PlatformEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let received = tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("Notification router stopping");
                    break;
                }
                received = receiver.recv() => received,
            };
            match received {
                Ok(event) => {
                    self.route_event(&event).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification router lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification router shutting down");
                    break;
                }
            }
        }
    }

    /// Deliver one event. Returns the number of connections it reached.
    pub async fn route_event(&self, event: &PlatformEvent) -> usize {
        match event.event_type.as_str() {
            USER_ONLINE | USER_OFFLINE | USER_CONNECTIONS_CHANGED => {
                let delivered = self.ws_manager.broadcast_event(event).await;
                tracing::debug!(
                    event_type = %event.event_type,
                    user_id = ?event.user_id,
                    delivered,
                    "Presence notification delivered"
                );
                delivered
            }
            other => {
                tracing::trace!(event_type = other, "No route for event");
                0
            }
        }
    }
}
