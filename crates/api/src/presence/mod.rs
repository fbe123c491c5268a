//! Process-local presence tracking.
//!
//! - [`store`] -- [`PresenceStore`]: a keyed registry of live connections.
//! - [`tracker`] -- [`PresenceTracker`]: online/offline edge detection on top
//!   of the store, with ordered [`PresenceEvent`] notifications.

pub mod store;
pub mod tracker;

pub use store::PresenceStore;
pub use tracker::{ConnectionRecord, PresenceError, PresenceEvent, PresenceTracker};
