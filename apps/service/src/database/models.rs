use serde::{Deserialize, Serialize};

use crate::monitoring::types::{JobType, Periodicity, Region, RegionSelection};

/// Monitor model - one externally registered endpoint, as the registry hands it out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Monitor {
    pub id: i64,
    pub url: String,
    pub periodicity: Periodicity,
    pub job_type: JobType,
    pub active: bool,
    pub regions: RegionSelection,
    /// Opaque owner reference, copied onto every ping
    pub workspace_id: Option<i64>,
    /// First status page the monitor is attached to, if any
    pub page_id: Option<i64>,
}

/// Ping model - the canonical, immutable record of one (monitor, region) check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ping {
    pub id: String,
    pub workspace_id: String,
    pub page_id: String,
    pub monitor_id: String,
    /// Milliseconds since the epoch when the check started
    pub timestamp: i64,
    /// HTTP status, `0` when no response was received
    pub status_code: u16,
    /// Milliseconds
    pub latency: u64,
    pub cron_timestamp: i64,
    pub url: String,
    /// Flat JSON object, stored as text
    pub metadata: String,
    pub region: Region,
}

impl Ping {
    /// Whether the check counts towards uptime.
    pub fn is_ok(&self) -> bool {
        (200..=299).contains(&self.status_code)
    }
}

/// Filter for range reads over stored pings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingRange {
    pub monitor_id: String,
    /// Inclusive lower bound on `timestamp`
    pub from: i64,
    /// Inclusive upper bound on `timestamp`
    pub to: Option<i64>,
    pub region: Option<Region>,
    pub cron_timestamp: Option<i64>,
    /// Keep only the most recent rows; `None` reads everything
    pub limit: Option<usize>,
}

impl PingRange {
    /// Everything ever recorded for `monitor_id`.
    pub fn for_monitor(monitor_id: impl Into<String>) -> Self {
        Self { monitor_id: monitor_id.into(), from: 0, to: None, region: None, cron_timestamp: None, limit: None }
    }
}

/// Result of an append, duplicates are not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted,
    Duplicate,
}
