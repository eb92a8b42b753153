use async_trait::async_trait;
use libsql::params::Params;
use libsql::{Row, Value, params};
use tracing::warn;

use super::models::{AppendOutcome, Monitor, Ping, PingRange};
use crate::aggregation::{Bucket, GroupBy, MS_PER_DAY};
use crate::error::StoreError;
use crate::monitoring::types::{JobType, Periodicity, Region, RegionSelection};
use crate::pool::LibsqlPool;

/// Read-only view of the monitors maintained by the management layer.
#[async_trait]
pub trait MonitorRegistry: Send + Sync {
    /// Active monitors scheduled at `periodicity`, read in a single statement.
    async fn active_monitors(&self, periodicity: Periodicity) -> Result<Vec<Monitor>, StoreError>;
}

/// Append-only time series of pings.
#[async_trait]
pub trait PingStore: Send + Sync {
    /// Insert `ping` unless a record with the same id already exists.
    async fn append(&self, ping: &Ping) -> Result<AppendOutcome, StoreError>;

    /// Pings matching `range`, oldest first. With a limit, the most recent rows are kept.
    async fn range(&self, range: &PingRange) -> Result<Vec<Ping>, StoreError>;

    /// The `limit` most recent buckets over `range`, oldest first, grouped in the store.
    async fn buckets(&self, range: &PingRange, group_by: GroupBy, limit: usize) -> Result<Vec<Bucket>, StoreError>;
}

/// Shared `WHERE` clause over `?1..=?5`, see [`range_params`].
const RANGE_FILTER: &str = "monitor_id = ?1
                            AND timestamp >= ?2
                            AND (?3 IS NULL OR timestamp <= ?3)
                            AND (?4 IS NULL OR region = ?4)
                            AND (?5 IS NULL OR cron_timestamp = ?5)";

const PING_COLUMNS: &str = "id, workspace_id, page_id, monitor_id, timestamp, status_code, \
                            latency, cron_timestamp, url, metadata, region";

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
}

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    pub(crate) async fn get_conn(&self) -> Result<deadpool::managed::Object<crate::pool::LibsqlManager>, StoreError> {
        Ok(self.pool.get().await?)
    }

    /// Round trip to the database, used by the health endpoint.
    pub async fn health_check(&self) -> Result<(), StoreError> {
        let conn = self.get_conn().await?;
        conn.query("SELECT 1", ()).await?.next().await?;
        Ok(())
    }

    fn monitor_from_row(row: &Row, periodicity: Periodicity) -> Result<Monitor, StoreError> {
        let job_type: String = row.get(2)?;
        let regions: String = row.get(3)?;

        Ok(Monitor {
            id: row.get(0)?,
            url: row.get(1)?,
            periodicity,
            job_type: job_type.parse::<JobType>().map_err(|e| StoreError::decode("monitors", e))?,
            active: true,
            regions: RegionSelection::parse(&regions).map_err(|e| StoreError::decode("monitors", e))?,
            workspace_id: row.get::<Option<i64>>(4)?,
            page_id: row.get::<Option<i64>>(5)?,
        })
    }

    fn bucket_from_row(row: &Row) -> Result<Bucket, StoreError> {
        let count: i64 = row.get(1)?;
        let ok: i64 = row.get(2)?;
        let latency_sum: i64 = row.get(3)?;
        let count = u64::try_from(count).map_err(|e| StoreError::decode("pings", e))?;

        Ok(Bucket {
            timestamp: row.get(0)?,
            count,
            ok: u64::try_from(ok).map_err(|e| StoreError::decode("pings", e))?,
            avg_latency: (latency_sum as f64 / count.max(1) as f64).round() as i64,
        })
    }

    fn ping_from_row(row: &Row) -> Result<Ping, StoreError> {
        let status_code: i64 = row.get(5)?;
        let latency: i64 = row.get(6)?;
        let region: String = row.get(10)?;

        Ok(Ping {
            id: row.get(0)?,
            workspace_id: row.get(1)?,
            page_id: row.get(2)?,
            monitor_id: row.get(3)?,
            timestamp: row.get(4)?,
            status_code: u16::try_from(status_code).map_err(|e| StoreError::decode("pings", e))?,
            latency: u64::try_from(latency).map_err(|e| StoreError::decode("pings", e))?,
            cron_timestamp: row.get(7)?,
            url: row.get(8)?,
            metadata: row.get(9)?,
            region: region.parse::<Region>().map_err(|e| StoreError::decode("pings", e))?,
        })
    }
}

#[async_trait]
impl MonitorRegistry for DatabaseImpl {
    async fn active_monitors(&self, periodicity: Periodicity) -> Result<Vec<Monitor>, StoreError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT m.id, m.url, m.job_type, m.regions, m.workspace_id,
                        (SELECT MIN(p.page_id) FROM monitors_to_pages p WHERE p.monitor_id = m.id)
                 FROM monitors m
                 WHERE m.active = 1 AND m.periodicity = ?
                 ORDER BY m.id",
                params![periodicity.tag()],
            )
            .await?;

        let mut monitors = Vec::new();
        while let Some(row) = rows.next().await? {
            match Self::monitor_from_row(&row, periodicity) {
                Ok(monitor) => monitors.push(monitor),
                // One misconfigured monitor must not stall the rest of the cycle.
                Err(e) => warn!(%periodicity, "Skipping monitor: {}", e),
            }
        }

        Ok(monitors)
    }
}

#[async_trait]
impl PingStore for DatabaseImpl {
    async fn append(&self, ping: &Ping) -> Result<AppendOutcome, StoreError> {
        let conn = self.get_conn().await?;
        let inserted = conn
            .execute(
                &format!(
                    "INSERT OR IGNORE INTO pings ({PING_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                params![
                    ping.id.clone(),
                    ping.workspace_id.clone(),
                    ping.page_id.clone(),
                    ping.monitor_id.clone(),
                    ping.timestamp,
                    i64::from(ping.status_code),
                    i64::try_from(ping.latency).unwrap_or(i64::MAX),
                    ping.cron_timestamp,
                    ping.url.clone(),
                    ping.metadata.clone(),
                    ping.region.code()
                ],
            )
            .await?;

        Ok(if inserted == 0 { AppendOutcome::Duplicate } else { AppendOutcome::Inserted })
    }

    async fn range(&self, range: &PingRange) -> Result<Vec<Ping>, StoreError> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {PING_COLUMNS} FROM pings
                     WHERE {RANGE_FILTER}
                     ORDER BY timestamp DESC, id DESC
                     LIMIT ?6"
                ),
                range_params(range, range.limit),
            )
            .await?;

        let mut pings = Vec::new();
        while let Some(row) = rows.next().await? {
            pings.push(Self::ping_from_row(&row)?);
        }
        pings.reverse();

        Ok(pings)
    }

    async fn buckets(&self, range: &PingRange, group_by: GroupBy, limit: usize) -> Result<Vec<Bucket>, StoreError> {
        let key = match group_by {
            GroupBy::Day => format!("(timestamp / {MS_PER_DAY}) * {MS_PER_DAY}"),
            GroupBy::Cron => "cron_timestamp".to_string(),
        };

        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {key} AS bucket,
                            COUNT(*),
                            SUM(CASE WHEN status_code BETWEEN 200 AND 299 THEN 1 ELSE 0 END),
                            SUM(latency)
                     FROM pings
                     WHERE {RANGE_FILTER}
                     GROUP BY bucket
                     ORDER BY bucket DESC
                     LIMIT ?6"
                ),
                range_params(range, Some(limit)),
            )
            .await?;

        let mut buckets = Vec::new();
        while let Some(row) = rows.next().await? {
            buckets.push(Self::bucket_from_row(&row)?);
        }
        buckets.reverse();

        Ok(buckets)
    }
}

/// Binds `?1..=?6`; a missing limit becomes SQLite's `LIMIT -1`.
fn range_params(range: &PingRange, limit: Option<usize>) -> Params {
    let limit = limit.map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX));
    Params::Positional(vec![
        Value::from(range.monitor_id.clone()),
        Value::from(range.from),
        Value::from(range.to),
        Value::from(range.region.map(|r| r.code())),
        Value::from(range.cron_timestamp),
        Value::from(limit),
    ])
}
