//! Vigil API server library.
//!
//! Session lifecycle (issue, validate, refresh, invalidate) and connection
//! presence, exposed over HTTP and WebSocket. The building blocks are public
//! so integration tests and the binary entrypoint share them.

pub mod auth;
pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod notifications;
pub mod presence;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
