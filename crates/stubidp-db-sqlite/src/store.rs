//! [`RowStore`] implementation over a SQLite pool.

use async_trait::async_trait;
use sqlx_core::query::Query;
use sqlx_core::row::Row;
use sqlx_sqlite::{Sqlite, SqliteArguments, SqlitePool, SqliteRow};
use stubidp_storage::{
    ColumnType, Filter, Record, RowStore, SqlDialect, SqlValue, Statement, StoreResult, TableDef,
};
use tracing::{debug, instrument};

use crate::config::SqliteConfig;
use crate::error::Result;
use crate::pool::create_pool;
use crate::schema::SchemaManager;

const DIALECT: SqlDialect = SqlDialect::Sqlite;

/// SQLite-backed row store.
///
/// JSON columns hold JSON text, expiry is an `INTEGER` of Unix seconds and
/// nested payload lookups use `json_extract(payload, '$.field')`.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens the database and creates the schema if `run_migrations` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema creation
    /// fails.
    pub async fn new(config: SqliteConfig) -> Result<Self> {
        let pool = create_pool(&config).await?;
        if config.run_migrations {
            SchemaManager::new(pool.clone()).ensure_schema().await?;
        }
        Ok(Self { pool })
    }

    /// Opens a private in-memory database with the schema in place.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        Self::new(SqliteConfig::in_memory()).await
    }

    /// Wraps an existing pool. The schema is assumed to exist.
    #[must_use]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns a schema manager sharing this store's pool.
    #[must_use]
    pub fn schema(&self) -> SchemaManager {
        SchemaManager::new(self.pool.clone())
    }

    async fn execute(&self, stmt: Statement) -> Result<u64> {
        debug!(sql = %stmt.sql, "Executing statement");
        let result = bind_all(sqlx_core::query::query(&stmt.sql), stmt.binds)?
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Binds values in order. JSON is sent as text.
fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    binds: Vec<SqlValue>,
) -> Result<Query<'q, Sqlite, SqliteArguments<'q>>> {
    for value in binds {
        query = match value {
            SqlValue::Text(v) => query.bind(v),
            SqlValue::BigInt(v) => query.bind(v),
            SqlValue::Json(v) => query.bind(v.map(|j| serde_json::to_string(&j)).transpose()?),
        };
    }
    Ok(query)
}

fn decode_row(table: &TableDef, row: &SqliteRow) -> Result<Record> {
    let mut record = Record::with_capacity(table.columns.len());
    for column in table.columns {
        let value = match column.ty {
            ColumnType::Text => SqlValue::Text(row.try_get::<Option<String>, _>(column.name)?),
            ColumnType::BigInt => SqlValue::BigInt(row.try_get::<Option<i64>, _>(column.name)?),
            ColumnType::Json => {
                let text = row.try_get::<Option<String>, _>(column.name)?;
                SqlValue::Json(text.map(|t| serde_json::from_str(&t)).transpose()?)
            }
        };
        record.push(column.name, value);
    }
    Ok(record)
}

#[async_trait]
impl RowStore for SqliteStore {
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
        let row = bind_all(sqlx_core::query::query(&stmt.sql), stmt.binds)?
            .fetch_optional(&self.pool)
            .await
            .map_err(crate::error::SqliteError::from)?;

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
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use stubidp_storage::schema::{CLIENTS, GRANTS};

    use super::*;

    #[tokio::test]
    async fn test_json_columns_are_stored_as_text() {
        let store = SqliteStore::in_memory().await.expect("open");
        let record = Record::new()
            .with("id", SqlValue::Text(Some("g-1".into())))
            .with("client_id", SqlValue::Text(Some("c-1".into())))
            .with("account_id", SqlValue::Text(None))
            .with("expires_at", SqlValue::BigInt(None))
            .with("payload", SqlValue::Json(Some(json!({"clientId": "c-1"}))));
        store.insert_or_replace(&GRANTS, &record).await.expect("insert");

        let (raw,): (String,) = sqlx_core::query_as::query_as("SELECT payload FROM grants WHERE id = ?")
            .bind("g-1")
            .fetch_one(store.pool())
            .await
            .expect("raw select");
        assert_eq!(serde_json::from_str::<serde_json::Value>(&raw).expect("json"), json!({"clientId": "c-1"}));

        let back = store
            .select_one(&GRANTS, Filter::column("client_id", "c-1"))
            .await
            .expect("select")
            .expect("row");
        assert_eq!(back, record);
    }

    #[tokio::test]
    async fn test_corrupt_json_is_a_serialization_error() {
        let store = SqliteStore::in_memory().await.expect("open");
        sqlx_core::query::query("INSERT INTO clients (client_id, payload) VALUES ('c-1', 'not json')")
            .execute(store.pool())
            .await
            .expect("raw insert");

        let err = store
            .select_one(&CLIENTS, Filter::column("client_id", "c-1"))
            .await
            .expect_err("corrupt payload");
        assert!(matches!(err, stubidp_storage::StoreError::Serialization(_)));
    }
}
