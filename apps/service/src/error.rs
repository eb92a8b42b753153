use thiserror::Error;

/// Failure talking to the database. Always worth retrying later.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("failed to open database: {0}")]
    Open(String),

    #[error("corrupt row in {table}: {reason}")]
    Decode { table: &'static str, reason: String },
}

impl StoreError {
    pub(crate) fn decode(table: &'static str, reason: impl ToString) -> Self {
        Self::Decode { table, reason: reason.to_string() }
    }
}

impl From<deadpool::managed::PoolError<libsql::Error>> for StoreError {
    fn from(err: deadpool::managed::PoolError<libsql::Error>) -> Self {
        Self::Pool(err.to_string())
    }
}

/// A raw ping was rejected before reaching storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid `{field}`: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self { field, reason: reason.into() }
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
