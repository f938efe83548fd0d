//! Connection pool management for the SQLite row store.

use std::str::FromStr;
use std::time::Duration;

use sqlx_core::pool::PoolOptions;
use sqlx_sqlite::{Sqlite, SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use tracing::{debug, info, instrument};

use crate::config::SqliteConfig;
use crate::error::{Result, SqliteError};

/// Type alias for SQLite pool options.
pub type SqlitePoolOptions = PoolOptions<Sqlite>;

/// Creates a new SQLite connection pool from the given configuration.
#[instrument(skip(config), fields(url = %config.url))]
pub async fn create_pool(config: &SqliteConfig) -> Result<SqlitePool> {
    if config.pool_size == 0 {
        return Err(SqliteError::config("pool_size must be greater than 0"));
    }

    let pool_size = config.effective_pool_size();
    info!(
        pool_size,
        memory = config.is_memory(),
        connect_timeout_ms = config.connect_timeout_ms,
        "Creating SQLite connection pool"
    );

    let mut connect = SqliteConnectOptions::from_str(&config.connect_url())?
        .create_if_missing(config.create_if_missing)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms));
    if !config.is_memory() {
        connect = connect.journal_mode(SqliteJournalMode::Wal);
    }

    let mut options = SqlitePoolOptions::new()
        .max_connections(pool_size)
        .acquire_timeout(Duration::from_millis(config.connect_timeout_ms));

    // An in-memory database lives as long as its only connection.
    if config.is_memory() {
        options = options
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = options.connect_with(connect).await?;

    debug!("SQLite connection pool created successfully");

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_pool_connects() {
        let pool = create_pool(&SqliteConfig::in_memory())
            .await
            .expect("memory pool");
        sqlx_core::query::query("SELECT 1")
            .execute(&pool)
            .await
            .expect("query");
    }

    #[tokio::test]
    async fn test_file_is_created() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("oidc.db");
        let config = SqliteConfig::new(path.display().to_string());

        let pool = create_pool(&config).await.expect("file pool");
        pool.close().await;
        assert!(path.exists());
    }
}
