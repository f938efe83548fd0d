//! The row store trait every relational backend implements.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::schema::{SqlDialect, TableDef};
use crate::types::{Filter, Record, SqlValue};

/// Minimal relational operations the persistence adapter needs.
///
/// A store executes statements against the tables declared in
/// [`crate::schema`]; it knows nothing about OIDC models or payload shapes.
/// Implementations must be thread-safe (`Send + Sync`) and hold no state that
/// outlives a single call other than their connection pool.
///
/// # Implementations
///
/// - PostgreSQL (in the `stubidp-db-postgres` crate)
/// - SQLite (in the `stubidp-db-sqlite` crate)
/// - [`MemoryStore`](crate::MemoryStore) for tests and local runs
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Inserts `record`, or overwrites every column of the row with the same
    /// primary key. Must be a single atomic statement.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    async fn insert_or_replace(&self, table: &'static TableDef, record: &Record) -> StoreResult<()>;

    /// Returns the first row matching `filter`, with every column of the table.
    ///
    /// When several rows match, a row without `expires_at` wins, then the
    /// one with the latest `expires_at`, so a live row is never hidden by an
    /// expired one.
    ///
    /// # Errors
    ///
    /// Returns an error only for backend failures, never for a missing row.
    async fn select_one(
        &self,
        table: &'static TableDef,
        filter: Filter<'_>,
    ) -> StoreResult<Option<Record>>;

    /// Sets `column` to `value` on the row whose primary key is `key`.
    ///
    /// Returns the number of rows affected (0 or 1).
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    async fn update_by_key(
        &self,
        table: &'static TableDef,
        key: &str,
        column: &'static str,
        value: SqlValue,
    ) -> StoreResult<u64>;

    /// Deletes every row matching `filter` and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    async fn delete_where(&self, table: &'static TableDef, filter: Filter<'_>) -> StoreResult<u64>;

    /// Deletes every row whose `expires_at` is strictly before `now`
    /// (Unix seconds) and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    async fn delete_expired(&self, table: &'static TableDef, now: i64) -> StoreResult<u64>;

    /// The SQL dialect of this backend, or `None` for non-SQL stores.
    fn dialect(&self) -> Option<SqlDialect>;

    /// Returns the name of this backend for logging.
    fn backend_name(&self) -> &'static str;
}
