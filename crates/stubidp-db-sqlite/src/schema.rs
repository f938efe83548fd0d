//! Schema management for the SQLite row store.

use sqlx_sqlite::SqlitePool;
use stubidp_storage::SqlDialect;
use stubidp_storage::schema::ALL_TABLES;
use tracing::{debug, info, instrument};

use crate::error::{Result, SqliteError};

/// Manages the model tables.
#[derive(Debug, Clone)]
pub struct SchemaManager {
    pool: SqlitePool,
}

impl SchemaManager {
    /// Creates a new `SchemaManager` with the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates every model table and index that does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::Schema`] naming the statement that failed.
    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> Result<()> {
        let statements = SqlDialect::Sqlite.schema_statements();
        info!(statements = statements.len(), "Ensuring SQLite schema");

        for sql in &statements {
            sqlx_core::query::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| SqliteError::schema(sql.clone(), e))?;
            debug!(%sql, "Applied schema statement");
        }

        Ok(())
    }

    /// Checks if a table exists in the database.
    #[instrument(skip(self))]
    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx_core::query_as::query_as(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    /// Names of model tables not present in the database.
    pub async fn missing_tables(&self) -> Result<Vec<&'static str>> {
        let mut missing = Vec::new();
        for table in ALL_TABLES {
            if !self.table_exists(table.name).await? {
                missing.push(table.name);
            }
        }
        Ok(missing)
    }
}
