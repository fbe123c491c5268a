//! Notification routing infrastructure.
//!
//! The [`NotificationRouter`] subscribes to the event bus and pushes presence
//! changes to connected WebSocket clients.

pub mod router;

pub use router::NotificationRouter;
