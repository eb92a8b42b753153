use std::sync::Arc;

use futures::future::join_all;
use rand::Rng;
use rand::seq::SliceRandom;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::executor::CheckExecutor;
use super::types::{CheckJob, CronTimestamp, ProbeFailure, Region, RegionSelection};
use crate::bus::{EventBus, PipelineEvent};
use crate::database::Monitor;
use crate::error::{IngestError, ValidationError};
use crate::ingest::Ingestor;
use crate::validation::RawPing;

/// Regions a monitor is checked from on this run.
///
/// `Auto` draws exactly one region uniformly from the full set on every call.
pub fn select_regions<R: Rng + ?Sized>(selection: &RegionSelection, rng: &mut R) -> Vec<Region> {
    match selection {
        RegionSelection::Auto => Region::ALL.choose(rng).copied().into_iter().collect(),
        RegionSelection::Explicit(regions) => regions.clone(),
    }
}

/// Fan `monitors` out into one job per (monitor, region), all sharing `cron_timestamp`.
pub fn plan_jobs<R: Rng + ?Sized>(
    monitors: &[Monitor],
    cron_timestamp: CronTimestamp,
    rng: &mut R,
) -> Vec<CheckJob> {
    let mut jobs = Vec::new();
    for monitor in monitors {
        let workspace_id = monitor.workspace_id.map(|id| id.to_string()).unwrap_or_default();
        let page_id = monitor.page_id.map(|id| id.to_string()).unwrap_or_default();

        for region in select_regions(&monitor.regions, rng) {
            jobs.push(CheckJob {
                monitor_id: monitor.id,
                workspace_id: workspace_id.clone(),
                page_id: page_id.clone(),
                url: monitor.url.clone(),
                region,
                cron_timestamp,
            });
        }
    }
    jobs
}

/// Where a job's result ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResult {
    Stored(String),
    Duplicate(String),
    Rejected(ValidationError),
    StoreFailed(String),
    /// The job task died before producing a result.
    Aborted(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub monitor_id: i64,
    pub region: Region,
    pub status_code: u16,
    pub failure: Option<ProbeFailure>,
    pub result: JobResult,
}

/// Runs jobs concurrently under one global limit and hands each outcome to ingestion.
pub struct RegionDispatcher {
    executor: Arc<CheckExecutor>,
    ingestor: Arc<Ingestor>,
    permits: Arc<Semaphore>,
    bus: EventBus,
}

impl RegionDispatcher {
    pub fn new(executor: Arc<CheckExecutor>, ingestor: Arc<Ingestor>, max_concurrency: usize, bus: EventBus) -> Self {
        Self { executor, ingestor, permits: Arc::new(Semaphore::new(max_concurrency.max(1))), bus }
    }

    /// Execute every job and wait for all of them. One report per job, in input order.
    pub async fn dispatch(&self, jobs: Vec<CheckJob>) -> Vec<JobReport> {
        let mut keys = Vec::with_capacity(jobs.len());
        let mut handles = Vec::with_capacity(jobs.len());

        for job in jobs {
            keys.push((job.monitor_id, job.region, job.cron_timestamp));

            let executor = self.executor.clone();
            let ingestor = self.ingestor.clone();
            let permits = self.permits.clone();

            handles.push(tokio::spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return JobReport {
                            monitor_id: job.monitor_id,
                            region: job.region,
                            status_code: 0,
                            failure: None,
                            result: JobResult::Aborted(e.to_string()),
                        };
                    }
                };

                let outcome = executor.execute(&job).await;
                let result = match ingestor.ingest(RawPing::from_check(&job, &outcome)).await {
                    Ok(receipt) if receipt.duplicate => JobResult::Duplicate(receipt.id),
                    Ok(receipt) => JobResult::Stored(receipt.id),
                    Err(IngestError::Validation(e)) => JobResult::Rejected(e),
                    Err(IngestError::Store(e)) => JobResult::StoreFailed(e.to_string()),
                };

                JobReport {
                    monitor_id: job.monitor_id,
                    region: job.region,
                    status_code: outcome.status_code,
                    failure: outcome.failure,
                    result,
                }
            }));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for ((monitor_id, region, cron_timestamp), joined) in keys.into_iter().zip(join_all(handles).await) {
            let report = joined.unwrap_or_else(|e| JobReport {
                monitor_id,
                region,
                status_code: 0,
                failure: None,
                result: JobResult::Aborted(e.to_string()),
            });

            let reason = match &report.result {
                JobResult::Stored(id) | JobResult::Duplicate(id) => {
                    debug!(monitor_id, %region, status_code = report.status_code, "Recorded ping {}", id);
                    None
                }
                JobResult::Rejected(e) => Some(format!("rejected: {e}")),
                JobResult::StoreFailed(e) => Some(format!("store failed: {e}")),
                JobResult::Aborted(e) => Some(format!("aborted: {e}")),
            };

            if let Some(reason) = reason {
                warn!(monitor_id, %region, %cron_timestamp, "Job failed: {}", reason);
                self.bus.publish(PipelineEvent::JobFailed { monitor_id, region, cron_timestamp, reason });
            }

            reports.push(report);
        }

        reports
    }
}
