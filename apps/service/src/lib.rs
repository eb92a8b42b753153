//! Synthetic uptime pipeline: scheduled HTTP checks from many regions, recorded as
//! pings and rolled up into uptime statistics on read.

pub mod aggregation;
pub mod bus;
pub mod config;
pub mod database;
pub mod error;
pub mod ingest;
pub mod monitoring;
pub mod orchestrator;
pub mod pool;
pub mod responses;
pub mod validation;

pub use aggregation::{Aggregator, Bucket, BucketQuery, GroupBy, UptimeStatus};
pub use bus::{EventBus, PipelineEvent};
pub use config::Config;
pub use error::{IngestError, StoreError, ValidationError};
pub use ingest::{IngestReceipt, Ingestor};
pub use orchestrator::{Caller, CycleReport, Orchestrator, SchedulerTrigger, Services, TriggerAck};
pub use responses::{PingResponse, ResponseLog, ResponseQuery};
pub use validation::RawPing;
