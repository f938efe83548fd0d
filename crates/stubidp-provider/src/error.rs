//! Error type for provider setup.

use stubidp_db_postgres::PostgresError;
use stubidp_db_sqlite::SqliteError;
use stubidp_storage::AdapterError;

/// Errors raised while building the provider configuration.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Invalid configuration or provider options.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A dialect was selected without a connection URL.
    #[error("database.url is required for dialect {dialect}")]
    MissingDatabaseUrl { dialect: String },

    /// Connecting to PostgreSQL or creating its schema failed.
    #[error("PostgreSQL setup failed: {0}")]
    Postgres(#[from] PostgresError),

    /// Opening SQLite or creating its schema failed.
    #[error("SQLite setup failed: {0}")]
    Sqlite(#[from] SqliteError),

    /// An adapter operation failed.
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl ProviderError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Result type alias for provider setup.
pub type Result<T> = std::result::Result<T, ProviderError>;
