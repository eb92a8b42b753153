/// Database abstraction layer
///
/// The monitor registry and the ping time series both live in one LibSQL (SQLite)
/// database reached through a `deadpool` connection pool.

pub mod migrations;
pub mod models;
pub mod repository;

pub use models::{AppendOutcome, Monitor, Ping, PingRange};
pub use repository::{DatabaseImpl, MonitorRegistry, PingStore};

use std::path::Path;

use crate::error::StoreError;
use crate::pool::{LibsqlManager, LibsqlPool};

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<(), StoreError> {
    migrations::run_migrations(conn).await
}

/// Open (or create) the database file, build the pool and bring the schema up to date.
pub async fn open(path: impl AsRef<Path>, max_connections: usize) -> Result<DatabaseImpl, StoreError> {
    let db = libsql::Builder::new_local(path.as_ref()).build().await?;
    let pool: LibsqlPool = deadpool::managed::Pool::builder(LibsqlManager::new(db))
        .max_size(max_connections.max(1))
        .build()
        .map_err(|e| StoreError::Open(e.to_string()))?;

    let conn = pool.get().await?;
    initialize_database(&conn).await?;
    drop(conn);

    Ok(DatabaseImpl::new_from_pool(pool))
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::monitoring::types::{Periodicity, Region, RegionSelection};

    fn ping(id: &str, monitor_id: &str, timestamp: i64, status_code: u16, region: Region) -> Ping {
        Ping {
            id: id.to_string(),
            workspace_id: "1".to_string(),
            page_id: "".to_string(),
            monitor_id: monitor_id.to_string(),
            timestamp,
            status_code,
            latency: 120,
            cron_timestamp: timestamp,
            url: "https://example.com".to_string(),
            metadata: "{}".to_string(),
            region,
        }
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let (db, _dir) = temp_database().await;
        let conn = db.get_conn().await.unwrap();
        initialize_database(&conn).await.unwrap();
        initialize_database(&conn).await.unwrap();
    }

    #[tokio::test]
    async fn test_registry_filters_active_and_periodicity() {
        let (db, _dir) = temp_database().await;
        insert_monitor(&db, 1, "https://a.example", "1m", true, "fra1,iad1").await;
        insert_monitor(&db, 2, "https://b.example", "1m", false, "fra1").await;
        insert_monitor(&db, 3, "https://c.example", "5m", true, "auto").await;
        insert_monitor(&db, 4, "https://d.example", "1m", true, "").await;
        attach_page(&db, 1, 42).await;
        attach_page(&db, 1, 7).await;

        let monitors = db.active_monitors(Periodicity::OneMinute).await.unwrap();
        let ids: Vec<i64> = monitors.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 4]);
        assert_eq!(monitors[0].regions, RegionSelection::Explicit(vec![Region::Fra1, Region::Iad1]));
        assert_eq!(monitors[0].page_id, Some(7));
        assert_eq!(monitors[0].workspace_id, Some(1));
        assert_eq!(monitors[1].regions, RegionSelection::Auto);
        assert_eq!(monitors[1].page_id, None);

        let five = db.active_monitors(Periodicity::FiveMinutes).await.unwrap();
        assert_eq!(five.len(), 1);
        assert!(db.active_monitors(Periodicity::OneHour).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_registry_skips_unknown_regions() {
        let (db, _dir) = temp_database().await;
        insert_monitor(&db, 1, "https://a.example", "10m", true, "fra1,mars1").await;
        insert_monitor(&db, 2, "https://b.example", "10m", true, "lhr1").await;

        let monitors = db.active_monitors(Periodicity::TenMinutes).await.unwrap();
        assert_eq!(monitors.len(), 1);
        assert_eq!(monitors[0].id, 2);
    }

    #[tokio::test]
    async fn test_append_is_idempotent_per_id() {
        let (db, _dir) = temp_database().await;
        let first = ping("p-1", "9", 1_000, 200, Region::Fra1);

        assert_eq!(db.append(&first).await.unwrap(), AppendOutcome::Inserted);
        assert_eq!(db.append(&first).await.unwrap(), AppendOutcome::Duplicate);

        let stored = db.range(&PingRange::for_monitor("9")).await.unwrap();
        assert_eq!(stored, vec![first]);
    }

    #[tokio::test]
    async fn test_range_filters_and_orders() {
        let (db, _dir) = temp_database().await;
        db.append(&ping("c", "9", 3_000, 500, Region::Fra1)).await.unwrap();
        db.append(&ping("a", "9", 1_000, 200, Region::Iad1)).await.unwrap();
        db.append(&ping("b", "9", 2_000, 0, Region::Fra1)).await.unwrap();
        db.append(&ping("x", "10", 2_000, 200, Region::Fra1)).await.unwrap();

        let all = db.range(&PingRange::for_monitor("9")).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(all[1].status_code, 0);

        let window = PingRange { from: 1_500, to: Some(2_500), ..PingRange::for_monitor("9") };
        let ids: Vec<String> = db.range(&window).await.unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["b"]);

        let fra = PingRange { region: Some(Region::Fra1), ..PingRange::for_monitor("9") };
        assert_eq!(db.range(&fra).await.unwrap().len(), 2);

        let cron = PingRange { cron_timestamp: Some(1_000), ..PingRange::for_monitor("9") };
        assert_eq!(db.range(&cron).await.unwrap().len(), 1);

        let latest = PingRange { limit: Some(2), ..PingRange::for_monitor("9") };
        let ids: Vec<String> = db.range(&latest).await.unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_concurrent_appends() {
        let (db, _dir) = temp_database().await;
        let db = std::sync::Arc::new(db);

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let db = db.clone();
                tokio::spawn(async move {
                    db.append(&ping(&format!("p-{i}"), "9", i, 200, Region::Sin1)).await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), AppendOutcome::Inserted);
        }
        assert_eq!(db.range(&PingRange::for_monitor("9")).await.unwrap().len(), 32);
        db.health_check().await.unwrap();
    }
}
