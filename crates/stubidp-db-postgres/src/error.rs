//! Error types for the PostgreSQL row store.

use sqlx_core::error::Error as SqlxError;
use stubidp_storage::StoreError;

/// PostgreSQL error code for undefined table (42P01).
pub const PG_UNDEFINED_TABLE: &str = "42P01";

/// Checks if a sqlx error has a specific PostgreSQL error code.
pub fn has_pg_error_code(err: &SqlxError, code: &str) -> bool {
    if let SqlxError::Database(db_err) = err {
        db_err.code().as_deref() == Some(code)
    } else {
        false
    }
}

/// Checks if a sqlx error is "undefined table" (42P01).
pub fn is_undefined_table(err: &SqlxError) -> bool {
    has_pg_error_code(err, PG_UNDEFINED_TABLE)
}

/// Errors specific to the PostgreSQL row store.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database connection or query error.
    #[error("Database connection error: {0}")]
    Connection(#[from] SqlxError),

    /// Schema creation failed.
    #[error("Schema error: {message}")]
    Schema {
        message: String,
        #[source]
        source: SqlxError,
    },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PostgresError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a new schema error.
    #[must_use]
    pub fn schema(message: impl Into<String>, source: SqlxError) -> Self {
        Self::Schema {
            message: message.into(),
            source,
        }
    }

    /// Returns `true` if a table the statement needs does not exist.
    #[must_use]
    pub fn is_undefined_table(&self) -> bool {
        match self {
            Self::Connection(e) | Self::Schema { source: e, .. } => is_undefined_table(e),
            Self::Config { .. } => false,
        }
    }
}

impl From<PostgresError> for StoreError {
    fn from(err: PostgresError) -> Self {
        StoreError::database(err)
    }
}

/// Result type alias for PostgreSQL operations.
pub type Result<T> = std::result::Result<T, PostgresError>;

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_error_display() {
        let err = PostgresError::config("invalid URL");
        assert!(err.to_string().contains("Configuration error"));

        let err = PostgresError::schema("sessions", SqlxError::PoolTimedOut);
        assert_eq!(err.to_string(), "Schema error: sessions");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_conversion_to_store_error() {
        let store_err: StoreError = PostgresError::from(SqlxError::PoolTimedOut).into();
        assert!(store_err.is_database_error());
        assert!(store_err.to_string().contains("Database connection error"));
    }

    #[test]
    fn test_undefined_table_only_for_database_errors() {
        assert!(!PostgresError::from(SqlxError::PoolClosed).is_undefined_table());
        assert!(!PostgresError::config("x").is_undefined_table());
    }
}
