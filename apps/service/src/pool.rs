use deadpool::managed::{self, Pool, RecycleResult};
use libsql::{Connection, Database, Error as LibsqlError};

/// Milliseconds a writer waits on a locked database before giving up.
const BUSY_TIMEOUT_MS: u32 = 5_000;

pub struct LibsqlManager {
    database: Database,
}

impl LibsqlManager {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

impl managed::Manager for LibsqlManager {
    type Type = Connection;
    type Error = LibsqlError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        let conn = self.database.connect()?;
        // Both pragmas answer with a row, so they go through `query`.
        conn.query(&format!("PRAGMA busy_timeout = {BUSY_TIMEOUT_MS}"), ()).await?;
        conn.query("PRAGMA journal_mode = WAL", ()).await?;
        Ok(conn)
    }

    async fn recycle(
        &self,
        conn: &mut Self::Type,
        _: &managed::Metrics,
    ) -> RecycleResult<Self::Error> {
        conn.query("SELECT 1", ())
            .await?
            .next()
            .await?
            .ok_or(LibsqlError::QueryReturnedNoRows)?;
        Ok(())
    }
}

pub type LibsqlPool = Pool<LibsqlManager>;
