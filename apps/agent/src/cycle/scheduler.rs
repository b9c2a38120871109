use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use super::{Orchestrator, TriggerOutcome, TriggerSource};

/// Fires `trigger(Scheduled)` after `first_delay`, then every `period`.
///
/// Ticks that land while a cycle is still running are skipped, not queued.
pub fn spawn_scheduler(
    orchestrator: Arc<Orchestrator>,
    period: Duration,
    first_delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(start) = Instant::now().checked_add(first_delay) else {
            warn!(first_delay_secs = first_delay.as_secs(), "First run delay out of range, scheduler idle");
            return;
        };
        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            period_secs = period.as_secs(),
            first_delay_secs = first_delay.as_secs(),
            "Scheduler started"
        );

        loop {
            ticker.tick().await;
            match orchestrator.trigger(TriggerSource::Scheduled).await {
                TriggerOutcome::Completed(_) => {}
                TriggerOutcome::Failed(message) => warn!("Scheduled cycle failed: {message}"),
                TriggerOutcome::AlreadyRunning => info!("Skipping scheduled tick, cycle in flight"),
            }
        }
    })
}
