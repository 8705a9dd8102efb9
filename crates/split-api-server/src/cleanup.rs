//! Periodic sweep that hard-deletes expired sessions.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::database::SessionStore;

/// Runs forever; spawned from `main`. The sweep only ever touches rows whose
/// `expires_at` has already passed, so it cannot race a legitimate edit to a
/// still-valid session. Store failures are logged and retried next tick.
pub async fn run_cleanup_loop(store: Arc<dyn SessionStore>, interval_hours: u64) {
    let period = Duration::from_secs(interval_hours.max(1) * 3600);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // First tick fires immediately, so one sweep runs at startup.
        ticker.tick().await;

        match store.cleanup_expired(Utc::now()).await {
            Ok(0) => debug!("Cleanup sweep found no expired sessions"),
            Ok(removed) => info!("Cleanup sweep removed {} expired sessions", removed),
            Err(e) => error!("Cleanup sweep failed: {}", e),
        }
    }
}
