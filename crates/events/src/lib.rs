//! Vigil event bus.
//!
//! - [`EventBus`] -- in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`] -- the notification envelope fanned out to clients and
//!   other subscribers (presence changes, session changes).

pub mod bus;

pub use bus::{EventBus, PlatformEvent};
