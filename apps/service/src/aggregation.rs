//! Read-side rollups over the ping store.
//!
//! Buckets are derived on every read and never stored, so the same query over the
//! same rows always yields the same numbers.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::database::{Ping, PingRange, PingStore};
use crate::error::StoreError;
use crate::monitoring::types::Region;

/// Default bucket limit: one day of 10 minute sampling across every region
/// (18 regions * 6 per hour * 24 hours = 2592), rounded.
pub const DEFAULT_LIMIT: usize = 2500;

pub(crate) const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown grouping {0:?}, expected \"day\" or \"cron\"")]
pub struct UnknownGroupBy(pub String);

/// How pings are grouped into buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    /// One bucket per UTC calendar day of the ping timestamp
    Day,
    /// One bucket per dispatch cycle, across all of its regions
    #[default]
    Cron,
}

impl FromStr for GroupBy {
    type Err = UnknownGroupBy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(GroupBy::Day),
            "cron" => Ok(GroupBy::Cron),
            other => Err(UnknownGroupBy(other.to_string())),
        }
    }
}

/// Uptime label consumers use for colouring. The thresholds live here and only here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UptimeStatus {
    Operational,
    Degraded,
    Down,
}

impl UptimeStatus {
    pub const OPERATIONAL_THRESHOLD: f64 = 0.98;
    pub const DEGRADED_THRESHOLD: f64 = 0.5;

    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= Self::OPERATIONAL_THRESHOLD {
            UptimeStatus::Operational
        } else if ratio >= Self::DEGRADED_THRESHOLD {
            UptimeStatus::Degraded
        } else {
            UptimeStatus::Down
        }
    }
}

impl fmt::Display for UptimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UptimeStatus::Operational => write!(f, "operational"),
            UptimeStatus::Degraded => write!(f, "degraded"),
            UptimeStatus::Down => write!(f, "down"),
        }
    }
}

/// Counts for one day or one cron run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    /// Start of the day, or the shared cron timestamp, in epoch milliseconds
    pub timestamp: i64,
    pub count: u64,
    /// Pings answered with a 2xx status
    pub ok: u64,
    /// Mean latency in milliseconds, rounded
    pub avg_latency: i64,
}

impl Bucket {
    pub fn uptime_ratio(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.ok as f64 / self.count as f64
    }

    pub fn status(&self) -> UptimeStatus {
        UptimeStatus::from_ratio(self.uptime_ratio())
    }
}

/// Parameters of a bucket query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketQuery {
    pub monitor_id: String,
    pub group_by: GroupBy,
    pub region: Option<Region>,
    pub from: i64,
    pub to: Option<i64>,
    pub cron_timestamp: Option<i64>,
    /// Most recent buckets to return
    pub limit: usize,
}

impl BucketQuery {
    pub fn new(monitor_id: impl Into<String>, group_by: GroupBy) -> Self {
        Self {
            monitor_id: monitor_id.into(),
            group_by,
            region: None,
            from: 0,
            to: None,
            cron_timestamp: None,
            limit: DEFAULT_LIMIT,
        }
    }

    fn range(&self) -> PingRange {
        PingRange {
            monitor_id: self.monitor_id.clone(),
            from: self.from,
            to: self.to,
            region: self.region,
            cron_timestamp: self.cron_timestamp,
            limit: None,
        }
    }
}

#[derive(Default)]
struct Accumulator {
    count: u64,
    ok: u64,
    latency_sum: u128,
}

/// Group `pings` into buckets, ascending by bucket timestamp. The store groups the same
/// way in SQL; this is the in-memory equivalent.
pub fn aggregate(pings: &[Ping], group_by: GroupBy) -> Vec<Bucket> {
    let mut buckets: BTreeMap<i64, Accumulator> = BTreeMap::new();

    for ping in pings {
        let key = match group_by {
            GroupBy::Day => ping.timestamp.div_euclid(MS_PER_DAY) * MS_PER_DAY,
            GroupBy::Cron => ping.cron_timestamp,
        };
        let acc = buckets.entry(key).or_default();
        acc.count += 1;
        acc.ok += u64::from(ping.is_ok());
        acc.latency_sum += u128::from(ping.latency);
    }

    buckets
        .into_iter()
        .map(|(timestamp, acc)| Bucket {
            timestamp,
            count: acc.count,
            ok: acc.ok,
            avg_latency: (acc.latency_sum as f64 / acc.count as f64).round() as i64,
        })
        .collect()
}

/// Computes buckets on demand from the ping store.
pub struct Aggregator {
    store: Arc<dyn PingStore>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn PingStore>) -> Self {
        Self { store }
    }

    /// Buckets for `query`, oldest first, keeping the `limit` most recent.
    pub async fn buckets(&self, query: &BucketQuery) -> Result<Vec<Bucket>, StoreError> {
        self.store.buckets(&query.range(), query.group_by, query.limit).await
    }
}
