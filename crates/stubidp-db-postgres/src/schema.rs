//! Schema management for the PostgreSQL row store.
//!
//! Creates the eight model tables and their indexes from the shared table
//! definitions. Every statement is `IF NOT EXISTS`, so running it against an
//! existing database is a no-op.

use sqlx_postgres::PgPool;
use stubidp_storage::SqlDialect;
use stubidp_storage::schema::ALL_TABLES;
use tracing::{debug, info, instrument};

use crate::error::{PostgresError, Result};

/// Manages the model tables.
#[derive(Debug, Clone)]
pub struct SchemaManager {
    pool: PgPool,
}

impl SchemaManager {
    /// Creates a new `SchemaManager` with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates every model table and index that does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresError::Schema`] naming the statement that failed.
    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> Result<()> {
        let statements = SqlDialect::Postgres.schema_statements();
        info!(statements = statements.len(), "Ensuring PostgreSQL schema");

        for sql in &statements {
            sqlx_core::query::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| PostgresError::schema(sql.clone(), e))?;
            debug!(%sql, "Applied schema statement");
        }

        Ok(())
    }

    /// Checks if a table exists in the database.
    #[instrument(skip(self))]
    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        let row: Option<(bool,)> = sqlx_core::query_as::query_as(
            "SELECT EXISTS (
                SELECT FROM information_schema.tables
                WHERE table_schema = current_schema() AND table_name = $1
            )",
        )
        .bind(table)
        .fetch_optional(&self.pool)
        .await
        .map_err(PostgresError::from)?;

        Ok(row.map(|(exists,)| exists).unwrap_or(false))
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
