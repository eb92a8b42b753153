/// Orchestrator module - coordinates all components
///
/// One dispatch cycle reads the registry, fans jobs out over regions, and lets each job's
/// outcome flow through validation into the store. `Services` wires the whole pipeline
/// from a [`Config`].
pub mod trigger;


pub use trigger::{Caller, SchedulerTrigger, SourceRange, TriggerAck, TriggerAuth};

use std::sync::Arc;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{error, info};

use crate::aggregation::Aggregator;
use crate::bus::{EventBus, PipelineEvent};
use crate::config::Config;
use crate::database::{self, DatabaseImpl, MonitorRegistry};
use crate::ingest::Ingestor;
use crate::monitoring::dispatcher::{JobResult, RegionDispatcher, plan_jobs};
use crate::monitoring::types::{CronTimestamp, Periodicity};
use crate::monitoring::{CheckExecutor, HttpChecker};
use crate::responses::ResponseLog;

/// Tally of one dispatch cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub periodicity: Periodicity,
    pub cron_timestamp: CronTimestamp,
    pub monitors: usize,
    pub jobs: usize,
    pub stored: usize,
    pub duplicates: usize,
    /// Jobs whose probe got no response; their pings are still stored
    pub probe_failures: usize,
    pub rejected: usize,
    pub store_failures: usize,
    pub aborted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_error: Option<String>,
}

impl CycleReport {
    fn empty(periodicity: Periodicity, cron_timestamp: CronTimestamp) -> Self {
        Self {
            periodicity,
            cron_timestamp,
            monitors: 0,
            jobs: 0,
            stored: 0,
            duplicates: 0,
            probe_failures: 0,
            rejected: 0,
            store_failures: 0,
            aborted: 0,
            registry_error: None,
        }
    }
}

/// Runs dispatch cycles.
pub struct Orchestrator {
    registry: Arc<dyn MonitorRegistry>,
    dispatcher: Arc<RegionDispatcher>,
    bus: EventBus,
}

impl Orchestrator {
    pub fn new(registry: Arc<dyn MonitorRegistry>, dispatcher: Arc<RegionDispatcher>, bus: EventBus) -> Self {
        Self { registry, dispatcher, bus }
    }

    /// Run one cycle stamped with the current time.
    pub async fn run_cycle(&self, periodicity: Periodicity) -> CycleReport {
        let mut rng = StdRng::from_entropy();
        self.run_cycle_with(periodicity, CronTimestamp::now(), &mut rng).await
    }

    /// Run one cycle with an explicit cron timestamp and random source.
    pub async fn run_cycle_with<R: Rng + ?Sized>(
        &self,
        periodicity: Periodicity,
        cron_timestamp: CronTimestamp,
        rng: &mut R,
    ) -> CycleReport {
        let mut report = CycleReport::empty(periodicity, cron_timestamp);

        let monitors = match self.registry.active_monitors(periodicity).await {
            Ok(monitors) => monitors,
            Err(e) => {
                error!(%periodicity, %cron_timestamp, "Failed to read monitor registry: {}", e);
                report.registry_error = Some(e.to_string());
                self.bus.publish(PipelineEvent::CycleCompleted(report.clone()));
                return report;
            }
        };

        let jobs = plan_jobs(&monitors, cron_timestamp, rng);
        report.monitors = monitors.len();
        report.jobs = jobs.len();

        info!(%periodicity, %cron_timestamp, monitors = report.monitors, "Dispatching {} jobs", report.jobs);
        self.bus.publish(PipelineEvent::CycleStarted { periodicity, cron_timestamp, jobs: report.jobs });

        for job in self.dispatcher.dispatch(jobs).await {
            if job.failure.is_some() {
                report.probe_failures += 1;
            }
            match job.result {
                JobResult::Stored(_) => report.stored += 1,
                JobResult::Duplicate(_) => report.duplicates += 1,
                JobResult::Rejected(_) => report.rejected += 1,
                JobResult::StoreFailed(_) => report.store_failures += 1,
                JobResult::Aborted(_) => report.aborted += 1,
            }
        }

        info!(
            %periodicity,
            %cron_timestamp,
            stored = report.stored,
            probe_failures = report.probe_failures,
            rejected = report.rejected,
            store_failures = report.store_failures,
            "Cycle complete"
        );
        self.bus.publish(PipelineEvent::CycleCompleted(report.clone()));
        report
    }
}

/// Every long-lived component of the pipeline, built once per process.
pub struct Services {
    pub database: Arc<DatabaseImpl>,
    pub orchestrator: Arc<Orchestrator>,
    pub trigger: Arc<SchedulerTrigger>,
    pub ingestor: Arc<Ingestor>,
    pub aggregator: Arc<Aggregator>,
    pub responses: Arc<ResponseLog>,
    pub bus: EventBus,
}

impl Services {
    pub async fn start(config: &Config) -> Result<Self> {
        info!("Opening database at {}", config.database.path.display());
        let database = Arc::new(
            database::open(&config.database.path, config.database.max_connections)
                .await
                .context("failed to open database")?,
        );

        let checker = HttpChecker::new(&config.region_proxies()?).context("failed to build HTTP client")?;
        let executor = Arc::new(CheckExecutor::new(Arc::new(checker), config.timeout()));
        let ingestor = Arc::new(Ingestor::new(database.clone()));
        let bus = EventBus::new();

        let dispatcher = Arc::new(RegionDispatcher::new(
            executor,
            ingestor.clone(),
            config.dispatch.max_concurrency,
            bus.clone(),
        ));
        let orchestrator = Arc::new(Orchestrator::new(database.clone(), dispatcher, bus.clone()));
        let auth = TriggerAuth::new(config.trigger.secret.as_deref(), config.trigger_sources()?);
        let trigger = Arc::new(SchedulerTrigger::new(auth, orchestrator.clone()));
        let aggregator = Arc::new(Aggregator::new(database.clone()));
        let responses = Arc::new(ResponseLog::new(database.clone()));

        Ok(Self { database, orchestrator, trigger, ingestor, aggregator, responses, bus })
    }
}
