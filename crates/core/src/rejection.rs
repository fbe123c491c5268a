//! Internal reasons a presented credential was refused.
//!
//! Callers only ever see a single opaque `Unauthorized` outcome. The reason
//! exists so logs can tell an expired token from a revoked one or a stale
//! session; it must never be copied into a response body.

use std::fmt;

/// Why a token failed validation or refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Bad encoding, bad signature, wrong issuer/audience or claim shape.
    Malformed,
    /// Past the embedded `exp` claim or the stored record expiry.
    Expired,
    /// No token record matches (signed out, rotated away, or swept).
    Revoked,
    /// The user's security stamp changed since the token was issued.
    StaleSession,
    /// The subject no longer exists in the user directory.
    UnknownUser,
    /// The subject exists but has been deactivated.
    Inactive,
}

impl RejectReason {
    /// Stable snake_case label used as a structured log field.
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::Malformed => "malformed",
            RejectReason::Expired => "expired",
            RejectReason::Revoked => "revoked",
            RejectReason::StaleSession => "stale_session",
            RejectReason::UnknownUser => "unknown_user",
            RejectReason::Inactive => "inactive",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
