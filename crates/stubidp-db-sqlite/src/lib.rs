//! SQLite row store for the stubidp persistence adapter.
//!
//! The embedded counterpart of `stubidp-db-postgres`: same tables, same
//! `RowStore` contract, JSON kept as text and queried with `json_extract`.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use stubidp_db_sqlite::{SqliteConfig, SqliteStore};
//! use stubidp_storage::OidcAdapter;
//!
//! let store = Arc::new(SqliteStore::new(SqliteConfig::new("sqlite://oidc.db")).await?);
//! let sessions = OidcAdapter::new(store, "Session")?;
//! ```

pub mod config;
pub mod error;
pub mod pool;
pub mod schema;
pub mod store;

pub use config::SqliteConfig;
pub use error::{Result, SqliteError};
pub use pool::create_pool;
pub use schema::SchemaManager;
pub use store::SqliteStore;

/// Type alias for a shareable SqliteStore instance.
pub type DynSqliteStore = std::sync::Arc<SqliteStore>;

/// Creates a new SQLite store with the given configuration.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or schema creation
/// fails.
pub async fn create_store(config: SqliteConfig) -> Result<DynSqliteStore> {
    let store = SqliteStore::new(config).await?;
    Ok(std::sync::Arc::new(store))
}
