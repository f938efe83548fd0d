//! Error types for the persistence adapter.
//!
//! Two layers exist:
//!
//! - [`StoreError`] is raised by a [`RowStore`](crate::RowStore) backend and
//!   describes what went wrong inside the database driver.
//! - [`AdapterError`] is what the OIDC engine sees. Backend faults are wrapped
//!   into [`AdapterError::Storage`] together with the model kind, the operation
//!   and the key, keeping the original [`StoreError`] as the error source.

use std::fmt;

use crate::model::{ModelKind, Operation};

/// Boxed driver error kept as the source of a [`StoreError::Database`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by a row store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database driver reported a failure.
    #[error("Database error: {0}")]
    Database(#[source] BoxError),

    /// A JSON column could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A row came back in a shape the table definition does not allow.
    #[error("Corrupt row in {table}: {message}")]
    CorruptRow {
        /// Table the row was read from.
        table: String,
        /// What was wrong with it.
        message: String,
    },
}

impl StoreError {
    /// Wraps a driver error.
    #[must_use]
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Database(Box::new(err))
    }

    /// Creates a `CorruptRow` error.
    #[must_use]
    pub fn corrupt_row(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptRow {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if the driver itself failed.
    #[must_use]
    pub fn is_database_error(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Result type for row store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by [`OidcAdapter`](crate::OidcAdapter) operations.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The requested model name is not one of the eight known kinds.
    #[error("Unknown model: {name}")]
    UnknownModel {
        /// The offending model name.
        name: String,
    },

    /// The caller passed invalid input. Raised before any storage access.
    #[error("{message} ({model}.{operation})")]
    Validation {
        model: ModelKind,
        operation: Operation,
        message: String,
    },

    /// `consume` targeted a row that does not exist.
    #[error("{model} with id {id} not found")]
    NotFound {
        model: ModelKind,
        operation: Operation,
        id: String,
    },

    /// The backing store failed.
    #[error("Failed to {operation} {model} with key: {key}")]
    Storage {
        model: ModelKind,
        operation: Operation,
        key: String,
        #[source]
        source: StoreError,
    },
}

impl AdapterError {
    /// Creates an `UnknownModel` error.
    #[must_use]
    pub fn unknown_model(name: impl Into<String>) -> Self {
        Self::UnknownModel { name: name.into() }
    }

    /// Creates a `Validation` error.
    #[must_use]
    pub fn validation(model: ModelKind, operation: Operation, message: impl Into<String>) -> Self {
        Self::Validation {
            model,
            operation,
            message: message.into(),
        }
    }

    /// Creates a `NotFound` error.
    #[must_use]
    pub fn not_found(model: ModelKind, operation: Operation, id: impl Into<String>) -> Self {
        Self::NotFound {
            model,
            operation,
            id: id.into(),
        }
    }

    /// Wraps a backend failure.
    #[must_use]
    pub fn storage(
        model: ModelKind,
        operation: Operation,
        key: impl Into<String>,
        source: StoreError,
    ) -> Self {
        Self::Storage {
            model,
            operation,
            key: key.into(),
            source,
        }
    }

    /// The model kind the error belongs to, if it was resolved.
    #[must_use]
    pub fn model(&self) -> Option<ModelKind> {
        match self {
            Self::UnknownModel { .. } => None,
            Self::Validation { model, .. }
            | Self::NotFound { model, .. }
            | Self::Storage { model, .. } => Some(*model),
        }
    }

    /// The adapter operation that failed.
    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            Self::UnknownModel { .. } => Operation::Construct,
            Self::Validation { operation, .. }
            | Self::NotFound { operation, .. }
            | Self::Storage { operation, .. } => *operation,
        }
    }

    /// Returns `true` for an unknown model name.
    #[must_use]
    pub fn is_unknown_model(&self) -> bool {
        matches!(self, Self::UnknownModel { .. })
    }

    /// Returns `true` for invalid caller input.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns `true` when `consume` found no row.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` when the backing store failed.
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownModel { .. } | Self::Validation { .. } => ErrorCategory::Caller,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
        }
    }
}

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Categories of adapter errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Bad caller input or unknown model.
    Caller,
    /// Missing row on a mutation that requires one.
    NotFound,
    /// Backing store failure.
    Infrastructure,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Caller => write!(f, "caller"),
            Self::NotFound => write!(f, "not_found"),
            Self::Infrastructure => write!(f, "infrastructure"),
        }
    }
}
