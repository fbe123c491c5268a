//! Security stamp check layered on top of token validation.
//!
//! A token that is correctly signed, unexpired and still on record is
//! nonetheless refused once the user's live security stamp differs from the
//! one embedded at issue time. The directory rotates the stamp on password,
//! role and active-flag changes, so one directory write retires every
//! outstanding access token without touching the token table.

use chrono::Duration;
use vigil_core::rejection::RejectReason;
use vigil_core::types::Timestamp;
use vigil_db::models::user::User;
use vigil_db::UserDirectory;

use crate::auth::jwt::AccessClaims;

/// Default gap between two persisted `last_active_at` writes.
pub const DEFAULT_ACTIVITY_THROTTLE_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct SecurityStampGuard {
    activity_throttle: Duration,
}

impl SecurityStampGuard {
    pub fn new(activity_throttle: Duration) -> Self {
        Self { activity_throttle }
    }

    /// Compare the stamp in `claims` with the user's current record.
    pub fn check(&self, claims: &AccessClaims, user: &User) -> Result<(), RejectReason> {
        if !user.is_active {
            return Err(RejectReason::Inactive);
        }
        if claims.stamp != user.security_stamp {
            return Err(RejectReason::StaleSession);
        }
        Ok(())
    }

    /// Whether enough idle time has passed to persist a new activity time.
    pub fn activity_due(&self, last_active_at: Option<Timestamp>, now: Timestamp) -> bool {
        match last_active_at {
            Some(last) => now - last > self.activity_throttle,
            None => true,
        }
    }

    /// Persist `now` as the user's last activity if the throttle allows it.
    ///
    /// A failed write is logged and ignored; activity bookkeeping never fails
    /// a request that has already been authenticated.
    pub async fn touch_activity(&self, users: &dyn UserDirectory, user: &User, now: Timestamp) {
        if !self.activity_due(user.last_active_at, now) {
            return;
        }
        if let Err(e) = users.set_last_active_at(user.id, now).await {
            tracing::warn!(user_id = user.id, error = %e, "Failed to record user activity");
        }
    }
}

impl Default for SecurityStampGuard {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_ACTIVITY_THROTTLE_SECS))
    }
}
