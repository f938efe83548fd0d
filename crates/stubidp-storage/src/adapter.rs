//! The persistence adapter the OIDC engine talks to.
//!
//! One [`OidcAdapter`] exists per model kind. It validates identifiers,
//! encodes payloads into rows, applies lazy expiry and delegates every
//! statement to a [`RowStore`]. It never looks at the SQL dialect.

use std::sync::Arc;

use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, error, instrument, warn};

use crate::error::{AdapterError, AdapterResult, StoreError};
use crate::model::{ModelKind, Operation, SecondaryKey};
use crate::payload::{self, ModelPayload};
use crate::traits::RowStore;
use crate::types::{Filter, Payload, SqlValue};

/// Current time in Unix seconds.
fn now_secs() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Storage adapter for a single model kind.
#[derive(Clone)]
pub struct OidcAdapter {
    kind: ModelKind,
    store: Arc<dyn RowStore>,
}

impl std::fmt::Debug for OidcAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcAdapter")
            .field("kind", &self.kind)
            .field("backend", &self.store.backend_name())
            .finish()
    }
}

impl OidcAdapter {
    /// Creates an adapter for the model named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::UnknownModel`] if `name` is not one of the
    /// eight model kinds.
    pub fn new(store: Arc<dyn RowStore>, name: &str) -> AdapterResult<Self> {
        let kind = ModelKind::resolve(name).inspect_err(|e| {
            error!(model = name, error = %e, "Rejected adapter for unknown model");
        })?;
        Ok(Self::for_kind(store, kind))
    }

    /// Creates an adapter for an already resolved kind.
    #[must_use]
    pub fn for_kind(store: Arc<dyn RowStore>, kind: ModelKind) -> Self {
        Self { kind, store }
    }

    #[must_use]
    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    fn key_filter<'a>(&self, id: &'a str) -> Filter<'a> {
        Filter::column(self.kind.table().key_column(), id)
    }

    fn storage_error(&self, operation: Operation, key: &str, source: StoreError) -> AdapterError {
        error!(
            model = %self.kind,
            operation = %operation,
            key,
            error = %source,
            "Storage operation failed"
        );
        AdapterError::storage(self.kind, operation, key, source)
    }

    fn validation_error(&self, operation: Operation, message: impl Into<String>) -> AdapterError {
        let err = AdapterError::validation(self.kind, operation, message);
        warn!(model = %self.kind, operation = %operation, error = %err, "Rejected adapter call");
        err
    }

    /// Deletes an expired row the caller just read.
    ///
    /// Best effort: the caller already treats the row as absent, so a failed
    /// delete is logged and dropped. The next read or purge retries it.
    async fn delete_expired_row(&self, id: &str) {
        if let Err(e) = self
            .store
            .delete_where(self.kind.table(), self.key_filter(id))
            .await
        {
            warn!(model = %self.kind, id, error = %e, "Failed to delete expired row");
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Inserts or replaces the row for `id`.
    ///
    /// `expires_in` is a lifetime in seconds; zero or negative means the row
    /// never expires. Clients are keyed by their own `client_id` and never
    /// expire.
    ///
    /// # Errors
    ///
    /// - [`AdapterError::Validation`] for an empty `id` or a Client payload
    ///   without `client_id`
    /// - [`AdapterError::Storage`] if the write fails
    #[instrument(skip(self, payload), fields(model = %self.kind))]
    pub async fn upsert(&self, id: &str, payload: Payload, expires_in: i64) -> AdapterResult<()> {
        if id.is_empty() {
            return Err(
                self.validation_error(Operation::Upsert, "ID is required for upsert operation")
            );
        }

        let encoded = ModelPayload::from_payload(self.kind, payload)
            .map_err(|message| self.validation_error(Operation::Upsert, message))?;
        let key = encoded.embedded_key().unwrap_or(id).to_string();

        let expires_at = (self.kind.expires() && expires_in > 0)
            .then(|| now_secs().saturating_add(expires_in));
        let table = self.kind.table();
        let record = encoded.into_record(table, &key, expires_at);

        self.store
            .insert_or_replace(table, &record)
            .await
            .map_err(|e| self.storage_error(Operation::Upsert, &key, e))?;

        debug!(model = %self.kind, key, ?expires_at, "Upserted row");
        Ok(())
    }

    /// Returns the payload stored under `id`.
    ///
    /// Returns `None` for an empty id, a missing row or an expired row.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Storage`] if the read fails or the row is corrupt.
    #[instrument(skip(self), fields(model = %self.kind))]
    pub async fn find(&self, id: &str) -> AdapterResult<Option<Payload>> {
        if id.is_empty() {
            return Ok(None);
        }
        self.find_where(Operation::Find, id, self.key_filter(id))
            .await
    }

    /// Finds a Session by its interaction `uid`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Storage`] if the read fails.
    pub async fn find_by_uid(&self, uid: &str) -> AdapterResult<Option<Payload>> {
        self.find_by_secondary(SecondaryKey::Uid, uid).await
    }

    /// Finds a DeviceCode by its `userCode`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Storage`] if the read fails.
    pub async fn find_by_user_code(&self, user_code: &str) -> AdapterResult<Option<Payload>> {
        self.find_by_secondary(SecondaryKey::UserCode, user_code)
            .await
    }

    /// Finds a row by a nested payload field.
    ///
    /// Kinds that do not support `key` never match.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Storage`] if the read fails.
    #[instrument(skip(self), fields(model = %self.kind))]
    pub async fn find_by_secondary(
        &self,
        key: SecondaryKey,
        value: &str,
    ) -> AdapterResult<Option<Payload>> {
        if value.is_empty() {
            return Ok(None);
        }
        if self.kind.secondary_key() != Some(key) {
            debug!(model = %self.kind, field = key.field(), "Model has no such lookup");
            return Ok(None);
        }
        self.find_where(key.operation(), value, Filter::payload_field(key.field(), value))
            .await
    }

    async fn find_where(
        &self,
        operation: Operation,
        lookup: &str,
        filter: Filter<'_>,
    ) -> AdapterResult<Option<Payload>> {
        let table = self.kind.table();
        let Some(record) = self
            .store
            .select_one(table, filter)
            .await
            .map_err(|e| self.storage_error(operation, lookup, e))?
        else {
            debug!(model = %self.kind, %operation, lookup, "No row found");
            return Ok(None);
        };

        if payload::is_expired(&record, now_secs()) {
            debug!(model = %self.kind, %operation, lookup, "Row expired");
            if let Some(key) = record.text(table.key_column()) {
                self.delete_expired_row(key).await;
            }
            return Ok(None);
        }

        payload::decode_record(self.kind, record)
            .map(Some)
            .map_err(|e| self.storage_error(operation, lookup, e))
    }

    /// Deletes the row for `id`. Absent rows are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Storage`] if the delete fails.
    #[instrument(skip(self), fields(model = %self.kind))]
    pub async fn destroy(&self, id: &str) -> AdapterResult<()> {
        if id.is_empty() {
            return Ok(());
        }
        let removed = self
            .store
            .delete_where(self.kind.table(), self.key_filter(id))
            .await
            .map_err(|e| self.storage_error(Operation::Destroy, id, e))?;

        debug!(model = %self.kind, id, removed, "Destroyed row");
        Ok(())
    }

    /// Marks the row for `id` as consumed at the current time.
    ///
    /// Only the stored `payload` column is rewritten; for Clients that is the
    /// residual map.
    ///
    /// # Errors
    ///
    /// - [`AdapterError::Validation`] for an empty `id`
    /// - [`AdapterError::NotFound`] if no live row exists
    /// - [`AdapterError::Storage`] if the read or write fails
    #[instrument(skip(self), fields(model = %self.kind))]
    pub async fn consume(&self, id: &str) -> AdapterResult<()> {
        if id.is_empty() {
            return Err(
                self.validation_error(Operation::Consume, "ID is required for consume operation")
            );
        }

        let table = self.kind.table();
        let now = now_secs();
        let not_found = || AdapterError::not_found(self.kind, Operation::Consume, id);

        let Some(mut record) = self
            .store
            .select_one(table, self.key_filter(id))
            .await
            .map_err(|e| self.storage_error(Operation::Consume, id, e))?
        else {
            return Err(not_found());
        };

        if payload::is_expired(&record, now) {
            self.delete_expired_row(id).await;
            return Err(not_found());
        }

        let mut stored = payload::take_payload_column(table, &mut record)
            .map_err(|e| self.storage_error(Operation::Consume, id, e))?;
        stored.insert("consumed".to_string(), Value::from(now));

        let updated = self
            .store
            .update_by_key(
                table,
                id,
                "payload",
                SqlValue::Json(Some(Value::Object(stored))),
            )
            .await
            .map_err(|e| self.storage_error(Operation::Consume, id, e))?;

        // Deleted between the read and the write.
        if updated == 0 {
            return Err(not_found());
        }

        debug!(model = %self.kind, id, consumed = now, "Consumed row");
        Ok(())
    }

    /// Deletes every row linked to `grant_id`.
    ///
    /// A no-op for an empty id and for kinds that carry no grant reference.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Storage`] if the delete fails.
    #[instrument(skip(self), fields(model = %self.kind))]
    pub async fn revoke_by_grant_id(&self, grant_id: &str) -> AdapterResult<()> {
        if grant_id.is_empty() {
            return Ok(());
        }
        if !self.kind.has_grant_id() {
            debug!(model = %self.kind, grant_id, "Model has no grant reference, nothing to revoke");
            return Ok(());
        }

        let removed = self
            .store
            .delete_where(self.kind.table(), Filter::column("grant_id", grant_id))
            .await
            .map_err(|e| self.storage_error(Operation::RevokeByGrantId, grant_id, e))?;

        debug!(model = %self.kind, grant_id, removed, "Revoked rows by grant");
        Ok(())
    }

    /// Deletes every expired row of this kind and returns how many went.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Storage`] if the delete fails.
    #[instrument(skip(self), fields(model = %self.kind))]
    pub async fn purge_expired(&self) -> AdapterResult<u64> {
        if !self.kind.expires() {
            return Ok(0);
        }
        let now = now_secs();
        let removed = self
            .store
            .delete_expired(self.kind.table(), now)
            .await
            .map_err(|e| self.storage_error(Operation::PurgeExpired, &now.to_string(), e))?;

        debug!(model = %self.kind, removed, "Purged expired rows");
        Ok(removed)
    }
}
