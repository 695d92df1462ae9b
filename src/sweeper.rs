use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::engine::BookingEngine;

/// Background task that periodically reconciles booking statuses with the
/// clock and releases idle lock-table entries. Returns once `shutdown` fires.
pub async fn run_sweeper(engine: Arc<BookingEngine>, every: Duration, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("status sweep every {}s", every.as_secs());

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                // Per-booking failures are logged by the engine and retried next tick.
                let report = engine.sweep_all().await;
                let pruned = engine.prune_locks();
                if pruned > 0 {
                    debug!("pruned {pruned} idle lock entries");
                }
                debug!("sweep tick: {} examined, {} transitioned", report.examined, report.transitioned);
            }
        }
    }
    info!("status sweep stopped");
}
