use libsql::Connection;

use crate::error::StoreError;

/// Schema version - increment when making schema changes
const SCHEMA_VERSION: i32 = 2;

/// Run database migrations
///
/// The management layer owns the rows in `monitors`; this service only reads them,
/// but the tables are declared here so a fresh database is usable end to end.
pub async fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT
        )",
        (),
    )
    .await?;

    let current_version = get_current_version(conn).await?;

    if current_version >= SCHEMA_VERSION {
        tracing::info!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    tracing::info!("Running migrations from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        run_migration_v1(conn).await?;
        record_migration(conn, 1, "Monitor registry").await?;
    }

    if current_version < 2 {
        run_migration_v2(conn).await?;
        record_migration(conn, 2, "Append-only ping store").await?;
    }

    tracing::info!("Database migrations completed successfully (now at version {})", SCHEMA_VERSION);
    Ok(())
}

async fn get_current_version(conn: &Connection) -> Result<i32, StoreError> {
    let mut rows = conn.query("SELECT MAX(version) FROM schema_migrations", ()).await?;

    if let Some(row) = rows.next().await? {
        let version: Option<i32> = row.get(0)?;
        Ok(version.unwrap_or(0))
    } else {
        Ok(0)
    }
}

async fn record_migration(conn: &Connection, version: i32, description: &str) -> Result<(), StoreError> {
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?, ?, ?)",
        libsql::params![version, now, description],
    )
    .await?;

    tracing::info!("Applied migration v{}: {}", version, description);
    Ok(())
}

/// Migration v1: monitors and their page attachments
async fn run_migration_v1(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS monitors (
            id INTEGER PRIMARY KEY,
            job_type TEXT NOT NULL DEFAULT 'other',
            periodicity TEXT NOT NULL DEFAULT 'other',
            status TEXT NOT NULL DEFAULT 'inactive',
            active INTEGER NOT NULL DEFAULT 0,
            regions TEXT NOT NULL DEFAULT '',
            url TEXT NOT NULL,
            name TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            workspace_id INTEGER,
            created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        )",
        (),
    )
    .await?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS monitors_to_pages (
            monitor_id INTEGER NOT NULL REFERENCES monitors(id) ON DELETE CASCADE,
            page_id INTEGER NOT NULL,
            PRIMARY KEY (monitor_id, page_id)
        )",
        (),
    )
    .await?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_monitors_schedule ON monitors(periodicity, active)",
        (),
    )
    .await?;

    Ok(())
}

/// Migration v2: the time-series table. Rows are never updated or deleted here.
async fn run_migration_v2(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS pings (
            id TEXT PRIMARY KEY,
            workspace_id TEXT NOT NULL,
            page_id TEXT NOT NULL,
            monitor_id TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            status_code INTEGER NOT NULL,
            latency INTEGER NOT NULL,
            cron_timestamp INTEGER NOT NULL,
            url TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            region TEXT NOT NULL
        )",
        (),
    )
    .await?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_pings_monitor_time ON pings(monitor_id, timestamp)",
        (),
    )
    .await?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_pings_monitor_cron ON pings(monitor_id, cron_timestamp)",
        (),
    )
    .await?;

    Ok(())
}
