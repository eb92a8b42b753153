use tokio::sync::broadcast;
use tracing::trace;

use crate::monitoring::types::{CronTimestamp, Periodicity, Region};
use crate::orchestrator::CycleReport;

const CAPACITY: usize = 64;

/// Progress of the pipeline, for whoever wants to watch it.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    CycleStarted { periodicity: Periodicity, cron_timestamp: CronTimestamp, jobs: usize },
    JobFailed { monitor_id: i64, region: Region, cron_timestamp: CronTimestamp, reason: String },
    CycleCompleted(CycleReport),
}

/// Broadcast fan-out of [`PipelineEvent`]s. Publishing never blocks and never fails;
/// slow subscribers lose the oldest events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: PipelineEvent) {
        trace!(?event, "Publishing pipeline event");
        // No receivers is fine
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        bus.publish(PipelineEvent::CycleStarted {
            periodicity: Periodicity::OneMinute,
            cron_timestamp: CronTimestamp::from_millis(0),
            jobs: 0,
        });

        let mut rx = bus.subscribe();
        bus.clone().publish(PipelineEvent::JobFailed {
            monitor_id: 3,
            region: Region::Gru1,
            cron_timestamp: CronTimestamp::from_millis(0),
            reason: "disk full".to_string(),
        });

        match rx.recv().await.unwrap() {
            PipelineEvent::JobFailed { monitor_id, region, .. } => {
                assert_eq!(monitor_id, 3);
                assert_eq!(region, Region::Gru1);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
