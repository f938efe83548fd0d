//! Tracing setup.
//!
//! Levels come from [`LoggingConfig`] unless `RUST_LOG` is set. The filter
//! sits behind a reload handle so the level can change without a restart.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::{LoggingConfig, level_directive};

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::new(level_directive(level))
}

/// Installs the global subscriber at `info`.
pub fn init_tracing() {
    init_from_config(&LoggingConfig::default());
}

pub fn init_tracing_with_level(level: &str) {
    init_from_config(&LoggingConfig {
        level: level.to_string(),
    });
}

/// Installs the global subscriber at the configured level.
///
/// `RUST_LOG`, when set and valid, wins over the configuration. Only the
/// first call installs a subscriber.
pub fn init_from_config(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_for(&logging.level));

    let (filter_layer, handle) = reload::Layer::new(filter);
    if FILTER_HANDLE.set(handle).is_err() {
        return;
    }

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Changes the level of an installed subscriber. Accepts the same aliases
/// as the configuration; a no-op before [`init_from_config`].
pub fn apply_logging_level(level: &str) {
    if let Some(handle) = FILTER_HANDLE.get() {
        let _ = handle.modify(|filter| *filter = filter_for(level));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent_and_reloadable() {
        init_from_config(&LoggingConfig {
            level: "fatal".into(),
        });
        init_tracing();
        assert!(FILTER_HANDLE.get().is_some());
        apply_logging_level("silent");
        apply_logging_level("debug");
    }
}
