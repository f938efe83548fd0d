//! In-memory row store.
//!
//! Backs the adapter in unit tests and in local runs without a database.
//! Rows live in a [`DashMap`] keyed by table name and primary key.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::StoreResult;
use crate::payload::{expires_at, is_expired};
use crate::schema::{SqlDialect, TableDef};
use crate::traits::RowStore;
use crate::types::{Filter, Record, SqlValue};

type RowKey = (&'static str, String);

/// In-memory [`RowStore`] using a concurrent hash map.
///
/// Every trait call is counted, which lets tests assert that an operation
/// never reached storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: DashMap<RowKey, Record>,
    operations: AtomicU64,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of [`RowStore`] calls made so far.
    #[must_use]
    pub fn operation_count(&self) -> u64 {
        self.operations.load(Ordering::SeqCst)
    }

    /// Number of rows currently held for `table`, expired ones included.
    #[must_use]
    pub fn row_count(&self, table: &TableDef) -> usize {
        self.rows.iter().filter(|e| e.key().0 == table.name).count()
    }

    fn record_call(&self) {
        self.operations.fetch_add(1, Ordering::SeqCst);
    }

    fn remove_matching(&self, table: &TableDef, mut keep: impl FnMut(&Record) -> bool) -> u64 {
        let mut removed = 0;
        self.rows.retain(|(name, _), record| {
            if *name != table.name || keep(record) {
                return true;
            }
            removed += 1;
            false
        });
        removed
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn insert_or_replace(&self, table: &'static TableDef, record: &Record) -> StoreResult<()> {
        self.record_call();
        let key = record.text(table.key_column()).unwrap_or_default().to_string();
        self.rows.insert((table.name, key), record.clone());
        Ok(())
    }

    async fn select_one(
        &self,
        table: &'static TableDef,
        filter: Filter<'_>,
    ) -> StoreResult<Option<Record>> {
        self.record_call();
        if let Filter::Column { column, value } = filter
            && column == table.key_column()
        {
            return Ok(self
                .rows
                .get(&(table.name, value.to_string()))
                .map(|r| r.value().clone()));
        }

        // Same preference as the SQL stores: no expiry first, then latest expiry.
        Ok(self
            .rows
            .iter()
            .filter(|e| e.key().0 == table.name && filter.matches(e.value()))
            .max_by_key(|e| match expires_at(e.value()) {
                None => (1, 0),
                Some(at) => (0, at),
            })
            .map(|e| e.value().clone()))
    }

    async fn update_by_key(
        &self,
        table: &'static TableDef,
        key: &str,
        column: &'static str,
        value: SqlValue,
    ) -> StoreResult<u64> {
        self.record_call();
        match self.rows.get_mut(&(table.name, key.to_string())) {
            Some(mut record) => {
                record.set(column, value);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_where(&self, table: &'static TableDef, filter: Filter<'_>) -> StoreResult<u64> {
        self.record_call();
        Ok(self.remove_matching(table, |record| !filter.matches(record)))
    }

    async fn delete_expired(&self, table: &'static TableDef, now: i64) -> StoreResult<u64> {
        self.record_call();
        Ok(self.remove_matching(table, |record| !is_expired(record, now)))
    }

    fn dialect(&self) -> Option<SqlDialect> {
        None
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::{ACCESS_TOKENS, SESSIONS};

    fn token(id: &str, grant: &str, expires_at: i64) -> Record {
        Record::new()
            .with("id", SqlValue::Text(Some(id.to_string())))
            .with("grant_id", SqlValue::Text(Some(grant.to_string())))
            .with("expires_at", SqlValue::BigInt(Some(expires_at)))
            .with("payload", SqlValue::Json(Some(json!({"grantId": grant}))))
    }

    #[tokio::test]
    async fn test_tables_are_separate() {
        let store = MemoryStore::new();
        store
            .insert_or_replace(&ACCESS_TOKENS, &token("x", "g", 10))
            .await
            .unwrap();

        let hit = store
            .select_one(&SESSIONS, Filter::column("id", "x"))
            .await
            .unwrap();
        assert!(hit.is_none());
        assert_eq!(store.row_count(&ACCESS_TOKENS), 1);
        assert_eq!(store.row_count(&SESSIONS), 0);
    }

    #[tokio::test]
    async fn test_delete_where_and_expired() {
        let store = MemoryStore::new();
        for (id, grant, exp) in [("a", "g1", 5), ("b", "g1", 50), ("c", "g2", 5)] {
            store
                .insert_or_replace(&ACCESS_TOKENS, &token(id, grant, exp))
                .await
                .unwrap();
        }

        let removed = store
            .delete_where(&ACCESS_TOKENS, Filter::column("grant_id", "g1"))
            .await
            .unwrap();
        assert_eq!(removed, 2);

        assert_eq!(store.delete_expired(&ACCESS_TOKENS, 5).await.unwrap(), 0);
        assert_eq!(store.delete_expired(&ACCESS_TOKENS, 6).await.unwrap(), 1);
        assert_eq!(store.operation_count(), 6);
    }

    #[tokio::test]
    async fn test_update_by_key() {
        let store = MemoryStore::new();
        store
            .insert_or_replace(&ACCESS_TOKENS, &token("a", "g", 5))
            .await
            .unwrap();

        let updated = store
            .update_by_key(&ACCESS_TOKENS, "a", "payload", SqlValue::Json(Some(json!({}))))
            .await
            .unwrap();
        assert_eq!(updated, 1);
        let missing = store
            .update_by_key(&ACCESS_TOKENS, "zz", "payload", SqlValue::Json(None))
            .await
            .unwrap();
        assert_eq!(missing, 0);

        let row = store
            .select_one(&ACCESS_TOKENS, Filter::column("id", "a"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.get("payload"), Some(&SqlValue::Json(Some(json!({})))));
    }
}
