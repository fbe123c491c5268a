//! Periodic removal of expired token records.
//!
//! Records are also pruned per user on every invalidation; this loop catches
//! users who never sign out.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::auth::issuer::{AuthError, TokenIssuer};

/// Run the sweep loop every `interval` until `cancel` is triggered.
pub async fn run(issuer: Arc<TokenIssuer>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Token sweep job started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Token sweep job stopping");
                break;
            }
            _ = ticker.tick() => {
                match issuer.sweep_expired(&cancel).await {
                    Ok(deleted) if deleted > 0 => {
                        tracing::info!(deleted, "Token sweep: purged expired records");
                    }
                    Ok(_) => tracing::debug!("Token sweep: nothing to purge"),
                    Err(AuthError::Cancelled) => {}
                    Err(e) => tracing::error!(error = %e, "Token sweep failed"),
                }
            }
        }
    }
}
