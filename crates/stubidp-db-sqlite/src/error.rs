//! Error types for the SQLite row store.

use sqlx_core::error::Error as SqlxError;
use stubidp_storage::StoreError;

/// Errors specific to the SQLite row store.
#[derive(Debug, thiserror::Error)]
pub enum SqliteError {
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

    /// A JSON column held text that is not valid JSON, or a value could not
    /// be encoded.
    #[error("JSON column error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl SqliteError {
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
}

impl From<SqliteError> for StoreError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Json(e) => StoreError::Serialization(e),
            other => StoreError::database(other),
        }
    }
}

/// Result type alias for SQLite operations.
pub type Result<T> = std::result::Result<T, SqliteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SqliteError::config("bad path");
        assert_eq!(err.to_string(), "Configuration error: bad path");
    }

    #[test]
    fn test_conversion_to_store_error() {
        let store_err: StoreError = SqliteError::from(SqlxError::PoolClosed).into();
        assert!(store_err.is_database_error());

        let json_err = serde_json::from_str::<serde_json::Value>("{").expect_err("invalid json");
        let store_err: StoreError = SqliteError::from(json_err).into();
        assert!(matches!(store_err, StoreError::Serialization(_)));
    }
}
