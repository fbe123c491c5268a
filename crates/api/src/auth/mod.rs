//! Authentication primitives.
//!
//! - [`jwt`] -- access/refresh token encoding and decoding.
//! - [`issuer`] -- [`TokenIssuer`](issuer::TokenIssuer): issue, validate, refresh, invalidate.
//! - [`stamp`] -- [`SecurityStampGuard`](stamp::SecurityStampGuard): live stamp check and
//!   throttled activity tracking.
//! - [`password`] -- Argon2id hashing for sign-in and password changes.

pub mod issuer;
pub mod jwt;
pub mod password;
pub mod stamp;
