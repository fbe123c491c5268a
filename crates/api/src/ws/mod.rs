//! WebSocket infrastructure for real-time communication.
//!
//! - [`hub`] -- connection lifecycle: presence, durable mirror, presence events.
//! - [`manager`] -- outbound frame routing per connection.
//! - `heartbeat` -- periodic pings.
//! - `handler` -- the authenticated HTTP upgrade.

mod handler;
mod heartbeat;
pub mod hub;
pub mod manager;

pub use handler::{ws_handler, ClientMeta, WsQuery};
pub use heartbeat::start_heartbeat;
pub use hub::{ConnectionContext, ConnectionHub, HubError};
pub use manager::WsManager;
