//! Error types for store operations.

pub type StoreResult<T> = Result<T, StoreError>;

/// Every variant is fatal for the stage that hit it.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("invalid row in {table}: {reason}")]
    InvalidRow { table: &'static str, reason: String },
}

impl StoreError {
    pub fn invalid_row(table: &'static str, reason: impl Into<String>) -> Self {
        StoreError::InvalidRow {
            table,
            reason: reason.into(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Configuration(_) => StoreError::Unavailable(err.to_string()),
            other => StoreError::Query(other.to_string()),
        }
    }
}
