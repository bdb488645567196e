//! Error types for PostgreSQL operations.

use basequery_engine::{ErrorCode, QueryError};
use thiserror::Error;

/// Result type for PostgreSQL operations.
pub type PgResult<T> = Result<T, PgError>;

/// Errors that can occur during PostgreSQL operations.
#[derive(Error, Debug)]
pub enum PgError {
    /// Connection pool error.
    #[error("pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// PostgreSQL error.
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// A statement parameter could not be bound.
    #[error("type conversion error: {0}")]
    TypeConversion(String),

    /// Timeout error.
    #[error("operation timed out after {0}ms")]
    Timeout(u64),
}

impl PgError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a type conversion error.
    pub fn type_conversion(message: impl Into<String>) -> Self {
        Self::TypeConversion(message.into())
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Pool(_) | Self::Connection(_) => true,
            Self::Postgres(e) => e.is_closed(),
            _ => false,
        }
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Pool(deadpool_postgres::PoolError::Timeout(_))
        )
    }
}

impl From<PgError> for QueryError {
    fn from(err: PgError) -> Self {
        match err {
            PgError::Pool(deadpool_postgres::PoolError::Timeout(kind)) => QueryError::new(
                ErrorCode::ConnectionTimeout,
                format!("Timed out acquiring a pooled connection ({:?})", kind),
            )
            .with_suggestion("Raise the pool size or the pool wait timeout"),
            PgError::Pool(e) => QueryError::connection(e.to_string()).with_source(e),
            PgError::Postgres(e) if e.is_closed() => {
                QueryError::connection(e.to_string()).with_source(e)
            }
            PgError::Postgres(e) => {
                let (message, state) = match e.as_db_error() {
                    Some(db) => (db.message().to_string(), Some(db.code().code().to_string())),
                    None => (e.to_string(), None),
                };
                let err = QueryError::database(message);
                let err = match state {
                    Some(state) => err.with_help(format!("SQLSTATE {}", state)),
                    None => err,
                };
                err.with_source(e)
            }
            PgError::Config(msg) => QueryError::configuration(msg),
            PgError::Connection(msg) => QueryError::connection(msg),
            PgError::TypeConversion(msg) => QueryError::new(ErrorCode::InvalidParameter, msg),
            PgError::Timeout(ms) => QueryError::connection_timeout(ms),
        }
    }
}
