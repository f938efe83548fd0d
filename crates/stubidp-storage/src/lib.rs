//! # stubidp-storage
//!
//! Persistence adapter for the stubidp OIDC provider.
//!
//! The OIDC engine persists eight kinds of state (sessions, tokens, codes,
//! grants, clients). This crate maps each kind onto a relational table and
//! exposes the engine-facing contract through [`OidcAdapter`].
//!
//! ## Overview
//!
//! - [`ModelKind`] is the closed registry of model names and their tables.
//! - [`OidcAdapter`] implements `upsert`, `find`, `find_by_uid`,
//!   `find_by_user_code`, `destroy`, `consume` and `revoke_by_grant_id`,
//!   applying lazy expiry on every read.
//! - [`RowStore`] is the narrow relational interface a backend implements.
//!   PostgreSQL and SQLite live in their own crates; [`MemoryStore`] is
//!   included here.
//! - [`SqlDialect`] renders DDL and DML for the two SQL backends.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use stubidp_storage::{MemoryStore, OidcAdapter};
//!
//! let store = Arc::new(MemoryStore::new());
//! let sessions = OidcAdapter::new(store, "Session")?;
//! sessions.upsert("sess-1", payload, 3600).await?;
//! let found = sessions.find_by_uid("u1").await?;
//! ```

mod adapter;
mod error;
mod memory;
mod model;
pub mod payload;
pub mod query;
pub mod schema;
mod traits;
mod types;

pub use adapter::OidcAdapter;
pub use error::{
    AdapterError, AdapterResult, BoxError, ErrorCategory, StoreError, StoreResult,
};
pub use memory::MemoryStore;
pub use model::{ModelKind, Operation, SecondaryKey};
pub use payload::{ClientPayload, ModelPayload};
pub use query::Statement;
pub use schema::{ColumnType, SqlDialect, TableDef};
pub use traits::RowStore;
pub use types::{Filter, Payload, Record, SqlValue};

/// Type alias for a shared row store.
pub type DynRowStore = std::sync::Arc<dyn RowStore>;

