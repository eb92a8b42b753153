use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{info, warn};

use super::types::Periodicity;
use crate::orchestrator::trigger::SchedulerTrigger;

/// Milliseconds from `now_ms` to the next multiple of `period` since the epoch.
pub fn until_next_boundary(now_ms: i64, period: Duration) -> Duration {
    let period_ms = i64::try_from(period.as_millis()).unwrap_or(i64::MAX).max(1);
    let remainder = now_ms.rem_euclid(period_ms);
    let wait = if remainder == 0 { 0 } else { period_ms - remainder };
    Duration::from_millis(wait as u64)
}

/// In-process wall clock: fires each fixed periodicity at its wall clock boundary.
pub struct Clock {
    trigger: Arc<SchedulerTrigger>,
}

impl Clock {
    pub fn new(trigger: Arc<SchedulerTrigger>) -> Self {
        Self { trigger }
    }

    /// One ticking task per periodicity that has a fixed interval.
    pub fn spawn(&self) -> Vec<tokio::task::JoinHandle<()>> {
        Periodicity::ALL
            .into_iter()
            .filter_map(|periodicity| Some((periodicity, periodicity.interval()?)))
            .map(|(periodicity, period)| {
                let trigger = self.trigger.clone();
                tokio::spawn(async move {
                    let now_ms = chrono::Utc::now().timestamp_millis();
                    let start = Instant::now() + until_next_boundary(now_ms, period);
                    let mut timer = interval_at(start, period);
                    // A late tick is dropped rather than replayed.
                    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

                    info!(%periodicity, "Clock armed, every {:?}", period);
                    loop {
                        timer.tick().await;
                        let cycle = trigger.start_cycle(periodicity);
                        tokio::spawn(async move {
                            if let Err(e) = cycle.await {
                                warn!(%periodicity, "Dispatch cycle task failed: {}", e);
                            }
                        });
                    }
                })
            })
            .collect()
    }
}
