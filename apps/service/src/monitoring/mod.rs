/// Monitoring engine: turns active monitors into probes and probes into pings
///
/// - `checker` performs the HTTP request from a region
/// - `executor` bounds one probe in time and records its outcome
/// - `dispatcher` fans monitors out over regions under a global concurrency limit
/// - `scheduler` is the in-process wall clock
pub mod checker;
pub mod dispatcher;
pub mod executor;
pub mod scheduler;
pub mod types;

pub use checker::{Checker, HttpChecker};
pub use dispatcher::{JobReport, JobResult, RegionDispatcher};
pub use executor::CheckExecutor;
pub use scheduler::Clock;
pub use types::{CheckJob, CheckOutcome, CronTimestamp, Periodicity, Region};
