//! [`RowStore`] implementation over a PostgreSQL pool.

use async_trait::async_trait;
use serde_json::Value;
use sqlx_core::query::Query;
use sqlx_core::row::Row;
use sqlx_postgres::{PgArguments, PgPool, PgRow, Postgres};
use stubidp_storage::{
    ColumnType, Filter, Record, RowStore, SqlDialect, SqlValue, Statement, StoreResult, TableDef,
};
use tracing::{debug, instrument};

use crate::config::PostgresConfig;
use crate::error::{PostgresError, Result};
use crate::pool::{create_pool, test_connection};
use crate::schema::SchemaManager;

const DIALECT: SqlDialect = SqlDialect::Postgres;

/// PostgreSQL-backed row store.
///
/// JSON columns are `JSONB`, expiry is a `BIGINT` of Unix seconds and
/// nested payload lookups use `payload->>'field'`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connects a pool, checks it with a round trip and creates the schema
    /// if `run_migrations` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot connect or schema creation fails.
    pub async fn new(config: PostgresConfig) -> Result<Self> {
        let pool = create_pool(&config).await?;
        test_connection(&pool).await?;
        if config.run_migrations {
            SchemaManager::new(pool.clone()).ensure_schema().await?;
        }
        Ok(Self { pool })
    }

    /// Wraps an existing pool. The schema is assumed to exist.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Returns a schema manager sharing this store's pool.
    #[must_use]
    pub fn schema(&self) -> SchemaManager {
        SchemaManager::new(self.pool.clone())
    }

    async fn execute(&self, stmt: Statement) -> Result<u64> {
        debug!(sql = %stmt.sql, "Executing statement");
        let result = bind_all(sqlx_core::query::query(&stmt.sql), stmt.binds)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    binds: Vec<SqlValue>,
) -> Query<'q, Postgres, PgArguments> {
    for value in binds {
        query = match value {
            SqlValue::Text(v) => query.bind(v),
            SqlValue::BigInt(v) => query.bind(v),
            SqlValue::Json(v) => query.bind(v),
        };
    }
    query
}

fn decode_row(table: &TableDef, row: &PgRow) -> Result<Record> {
    let mut record = Record::with_capacity(table.columns.len());
    for column in table.columns {
        let value = match column.ty {
            ColumnType::Text => SqlValue::Text(row.try_get::<Option<String>, _>(column.name)?),
            ColumnType::BigInt => SqlValue::BigInt(row.try_get::<Option<i64>, _>(column.name)?),
            ColumnType::Json => SqlValue::Json(row.try_get::<Option<Value>, _>(column.name)?),
        };
        record.push(column.name, value);
    }
    Ok(record)
}

#[async_trait]
impl RowStore for PostgresStore {
    #[instrument(skip(self, table, record), fields(table = table.name))]
    async fn insert_or_replace(&self, table: &'static TableDef, record: &Record) -> StoreResult<()> {
        self.execute(DIALECT.upsert(table, record)).await?;
        Ok(())
    }

    #[instrument(skip(self, table), fields(table = table.name))]
    async fn select_one(
        &self,
        table: &'static TableDef,
        filter: Filter<'_>,
    ) -> StoreResult<Option<Record>> {
        let stmt = DIALECT.select_one(table, filter);
        let row = bind_all(sqlx_core::query::query(&stmt.sql), stmt.binds)
            .fetch_optional(&self.pool)
            .await
            .map_err(PostgresError::from)?;

        Ok(row.map(|r| decode_row(table, &r)).transpose()?)
    }

    #[instrument(skip(self, table, value), fields(table = table.name))]
    async fn update_by_key(
        &self,
        table: &'static TableDef,
        key: &str,
        column: &'static str,
        value: SqlValue,
    ) -> StoreResult<u64> {
        Ok(self
            .execute(DIALECT.update_by_key(table, key, column, value))
            .await?)
    }

    #[instrument(skip(self, table), fields(table = table.name))]
    async fn delete_where(&self, table: &'static TableDef, filter: Filter<'_>) -> StoreResult<u64> {
        Ok(self.execute(DIALECT.delete_where(table, filter)).await?)
    }

    #[instrument(skip(self, table), fields(table = table.name))]
    async fn delete_expired(&self, table: &'static TableDef, now: i64) -> StoreResult<u64> {
        Ok(self.execute(DIALECT.delete_expired(table, now)).await?)
    }

    fn dialect(&self) -> Option<SqlDialect> {
        Some(DIALECT)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
