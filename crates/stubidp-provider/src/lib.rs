pub mod config;
pub mod error;
pub mod observability;
pub mod provider;
pub mod storage;
pub mod validation;

pub use config::{AppConfig, DatabaseSettings, LoggingConfig, ProviderSettings};
pub use error::{ProviderError, Result};
pub use observability::{apply_logging_level, init_from_config, init_tracing, init_tracing_with_level};
pub use provider::{
    ClientRegistration, Features, ProviderConfiguration, ProviderOptions, create_provider,
    discovery_url,
};
pub use storage::{AdapterFactory, connect_store};
pub use validation::{ValidationErrors, Violation, validate_payload};

pub use stubidp_storage::{AdapterError, ModelKind, OidcAdapter, SqlDialect};
