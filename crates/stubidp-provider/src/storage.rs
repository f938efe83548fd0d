//! Dialect selection and the adapter factory handed to the OIDC engine.
//!
//! The dialect is read once from [`DatabaseSettings`]; after connecting,
//! nothing downstream knows which backend it talks to.

use std::sync::Arc;

use stubidp_db_postgres::{PostgresConfig, PostgresStore, mask_password};
use stubidp_db_sqlite::{SqliteConfig, SqliteStore};
use stubidp_storage::{
    AdapterResult, DynRowStore, ModelKind, OidcAdapter, SqlDialect,
};
use tracing::{info, instrument};

use crate::config::DatabaseSettings;
use crate::error::{ProviderError, Result};

impl DatabaseSettings {
    fn require_url(&self, dialect: SqlDialect) -> Result<&str> {
        self.url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ProviderError::MissingDatabaseUrl {
                dialect: dialect.to_string(),
            })
    }

    /// PostgreSQL store configuration derived from these settings.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::MissingDatabaseUrl`] if no URL is set.
    pub fn postgres_config(&self) -> Result<PostgresConfig> {
        Ok(PostgresConfig::new(self.require_url(SqlDialect::Postgres)?)
            .with_pool_size(self.pool_size)
            .with_connect_timeout_ms(self.connect_timeout_ms)
            .with_run_migrations(self.run_migrations))
    }

    /// SQLite store configuration derived from these settings.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::MissingDatabaseUrl`] if no URL is set.
    pub fn sqlite_config(&self) -> Result<SqliteConfig> {
        Ok(SqliteConfig::new(self.require_url(SqlDialect::Sqlite)?)
            .with_pool_size(self.pool_size)
            .with_connect_timeout_ms(self.connect_timeout_ms)
            .with_run_migrations(self.run_migrations))
    }
}

/// Connects the row store for the configured dialect.
///
/// Returns `None` when no dialect is configured.
///
/// # Errors
///
/// Returns an error if the URL is missing, the database cannot be reached,
/// or schema creation fails.
#[instrument(skip(settings), fields(dialect = ?settings.dialect))]
pub async fn connect_store(settings: &DatabaseSettings) -> Result<Option<DynRowStore>> {
    let Some(dialect) = settings.dialect else {
        info!("No database dialect configured, adapter disabled");
        return Ok(None);
    };

    let store: DynRowStore = match dialect {
        SqlDialect::Postgres => {
            let config = settings.postgres_config()?;
            info!(url = %mask_password(&config.url), "Connecting PostgreSQL store");
            Arc::new(PostgresStore::new(config).await?)
        }
        SqlDialect::Sqlite => {
            let config = settings.sqlite_config()?;
            info!(url = %config.url, "Opening SQLite store");
            Arc::new(SqliteStore::new(config).await?)
        }
    };

    Ok(Some(store))
}

/// Builds one [`OidcAdapter`] per model name over a shared store.
#[derive(Clone)]
pub struct AdapterFactory {
    store: DynRowStore,
}

impl std::fmt::Debug for AdapterFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterFactory")
            .field("backend", &self.store.backend_name())
            .finish()
    }
}

impl AdapterFactory {
    #[must_use]
    pub fn new(store: DynRowStore) -> Self {
        Self { store }
    }

    /// Creates the adapter for the model named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`stubidp_storage::AdapterError::UnknownModel`] for names
    /// outside the eight model kinds.
    pub fn create(&self, name: &str) -> AdapterResult<OidcAdapter> {
        OidcAdapter::new(self.store.clone(), name)
    }

    #[must_use]
    pub fn store(&self) -> &DynRowStore {
        &self.store
    }

    /// The dialect of the underlying store, `None` for the in-memory store.
    #[must_use]
    pub fn dialect(&self) -> Option<SqlDialect> {
        self.store.dialect()
    }

    /// Purges expired rows of every kind and returns the total removed.
    ///
    /// # Errors
    ///
    /// Stops at the first kind whose purge fails.
    pub async fn purge_expired(&self) -> AdapterResult<u64> {
        let mut total = 0;
        for kind in ModelKind::ALL {
            total += OidcAdapter::for_kind(self.store.clone(), kind)
                .purge_expired()
                .await?;
        }
        info!(removed = total, "Purged expired rows");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use stubidp_storage::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn test_no_dialect_means_no_store() {
        let store = connect_store(&DatabaseSettings::default())
            .await
            .expect("nothing to connect");
        assert!(store.is_none());
    }

    #[tokio::test]
    async fn test_missing_url_is_reported() {
        let settings = DatabaseSettings {
            dialect: Some(SqlDialect::Postgres),
            ..Default::default()
        };
        let err = connect_store(&settings).await.err().expect("url missing");
        assert!(matches!(err, ProviderError::MissingDatabaseUrl { .. }));
        assert_eq!(err.to_string(), "database.url is required for dialect postgres");
    }

    #[tokio::test]
    async fn test_sqlite_store_connects() {
        let settings = DatabaseSettings {
            dialect: Some(SqlDialect::Sqlite),
            url: Some("sqlite::memory:".into()),
            ..Default::default()
        };
        let store = connect_store(&settings)
            .await
            .expect("connect")
            .expect("store configured");
        assert_eq!(store.dialect(), Some(SqlDialect::Sqlite));
        assert_eq!(store.backend_name(), "sqlite");
    }

    #[tokio::test]
    async fn test_factory_creates_adapters() {
        let factory = AdapterFactory::new(Arc::new(MemoryStore::new()));
        assert!(factory.create("Session").is_ok());
        assert!(factory.create("UnknownModel").expect_err("unknown").is_unknown_model());
        assert_eq!(factory.dialect(), None);

        let sessions = factory.create("Session").expect("known");
        let payload = json!({"uid": "u1"}).as_object().cloned().expect("object");
        sessions.upsert("sess-1", payload.clone(), 60).await.expect("upsert");

        // A second adapter for the same kind sees the same store.
        let again = factory.create("Session").expect("known");
        assert_eq!(again.find("sess-1").await.expect("find"), Some(payload));
        assert_eq!(factory.purge_expired().await.expect("purge"), 0);
    }
}
