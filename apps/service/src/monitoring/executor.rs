use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio::time::timeout;
use tracing::debug;

use super::checker::{Checker, ProbeError};
use super::types::{CheckJob, CheckOutcome, NO_RESPONSE_STATUS};

/// Runs a single job against its target and turns whatever happens into a [`CheckOutcome`].
pub struct CheckExecutor {
    checker: Arc<dyn Checker>,
    timeout: Duration,
}

impl CheckExecutor {
    pub fn new(checker: Arc<dyn Checker>, timeout: Duration) -> Self {
        Self { checker, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe `job.url` from `job.region`. Never fails: a probe that got no response
    /// is reported with [`NO_RESPONSE_STATUS`].
    pub async fn execute(&self, job: &CheckJob) -> CheckOutcome {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let start = Instant::now();

        let result = timeout(self.timeout, self.checker.check(&job.url, job.region))
            .await
            .unwrap_or(Err(ProbeError::Timeout));
        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(response) => {
                let metadata: Map<String, Value> = response
                    .headers
                    .into_iter()
                    .map(|(name, value)| (name, Value::String(value)))
                    .collect();

                CheckOutcome {
                    timestamp,
                    status_code: response.status_code,
                    latency_ms,
                    failure: None,
                    metadata,
                }
            }
            Err(err) => {
                debug!(
                    monitor_id = job.monitor_id,
                    region = %job.region,
                    cron_timestamp = %job.cron_timestamp,
                    "Probe of {} failed: {}",
                    job.url,
                    err
                );

                let mut metadata = Map::new();
                metadata.insert("error".to_string(), Value::from(err.kind().as_str()));
                metadata.insert("message".to_string(), Value::from(err.to_string()));

                CheckOutcome {
                    timestamp,
                    status_code: NO_RESPONSE_STATUS,
                    latency_ms,
                    failure: Some(err.kind()),
                    metadata,
                }
            }
        }
    }
}
