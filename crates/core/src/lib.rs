//! Shared primitives for the Vigil session and presence service.
//!
//! - [`types`] -- id and timestamp aliases used across every crate.
//! - [`error`] -- the domain error type surfaced by handlers.
//! - [`rejection`] -- internal reasons a credential was refused.
//! - [`hashing`] -- SHA-256 digest used for token fingerprints.

pub mod error;
pub mod hashing;
pub mod rejection;
pub mod types;
