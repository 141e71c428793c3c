//! Periodic eviction of silent sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::Relay;

/// Run the eviction sweep every `interval` until `cancel` fires.
///
/// The first sweep happens one full `interval` after start.
pub async fn run_reaper(relay: Arc<Relay>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let evicted = relay.reap();
                if !evicted.is_empty() {
                    debug!(count = evicted.len(), "reaper sweep evicted sessions");
                }
            }
            () = cancel.cancelled() => {
                info!("reaper stopped");
                return;
            }
        }
    }
}

/// Spawn [`run_reaper`] on the current runtime.
pub fn spawn_reaper(relay: Arc<Relay>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    info!(
        interval_ms = interval.as_millis() as u64,
        stale_timeout_ms = relay.stale_timeout().as_millis() as u64,
        "starting reaper"
    );
    tokio::spawn(run_reaper(relay, interval, cancel))
}
