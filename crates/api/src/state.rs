use std::sync::Arc;

use vigil_db::{ConnectionMirror, TokenStore, UserDirectory};
use vigil_events::EventBus;

use crate::auth::issuer::TokenIssuer;
use crate::auth::stamp::SecurityStampGuard;
use crate::config::ServerConfig;
use crate::presence::PresenceTracker;
use crate::ws::{ConnectionHub, WsManager};

/// The three store capabilities the service runs on.
#[derive(Clone)]
pub struct Stores {
    pub tokens: Arc<dyn TokenStore>,
    pub users: Arc<dyn UserDirectory>,
    pub connections: Arc<dyn ConnectionMirror>,
}

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Sole writer of the token store.
    pub tokens: Arc<TokenIssuer>,
    pub users: Arc<dyn UserDirectory>,
    /// Canonical in-process presence.
    pub presence: Arc<PresenceTracker>,
    /// Connect/disconnect entry point for the WebSocket transport.
    pub hub: Arc<ConnectionHub>,
    /// Outbound frame routing (browser clients).
    pub ws_manager: Arc<WsManager>,
    /// Centralized event bus for publishing platform events.
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    /// Wire every component on top of the given stores.
    pub fn new(config: ServerConfig, stores: Stores) -> Self {
        let guard = SecurityStampGuard::new(chrono::Duration::seconds(
            config.session.activity_throttle_secs,
        ));
        let tokens = Arc::new(TokenIssuer::new(
            config.jwt.clone(),
            guard,
            Arc::clone(&stores.tokens),
            Arc::clone(&stores.users),
        ));

        let event_bus = Arc::new(EventBus::default());
        let presence = Arc::new(PresenceTracker::new());
        let hub = Arc::new(ConnectionHub::new(
            Arc::clone(&presence),
            stores.connections,
            Arc::clone(&stores.users),
            Arc::clone(&event_bus),
            config.instance_id.clone(),
        ));

        Self {
            config: Arc::new(config),
            tokens,
            users: stores.users,
            presence,
            hub,
            ws_manager: Arc::new(WsManager::new()),
            event_bus,
        }
    }
}
