//! Configuration types for the SQLite row store.

use serde::{Deserialize, Serialize};

/// Configuration for the SQLite row store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database location: `sqlite://path/to/file.db` or `sqlite::memory:`.
    /// A bare file path is accepted too.
    pub url: String,

    /// Connection pool size. Forced to 1 for in-memory databases, where each
    /// connection would otherwise see its own empty database.
    pub pool_size: u32,

    /// Pool acquire timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// How long a statement waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Create the database file if it does not exist.
    pub create_if_missing: bool,

    /// Whether to create the model tables on startup.
    pub run_migrations: bool,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://stubidp.db".into(),
            pool_size: 5,
            connect_timeout_ms: 5000,
            busy_timeout_ms: 5000,
            create_if_missing: true,
            run_migrations: true,
        }
    }
}

impl SqliteConfig {
    /// Creates a new configuration with the given URL or path.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Configuration for a private in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new("sqlite::memory:")
    }

    /// Sets the pool size.
    #[must_use]
    pub fn with_pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn with_connect_timeout_ms(mut self, timeout: u64) -> Self {
        self.connect_timeout_ms = timeout;
        self
    }

    /// Sets the busy timeout.
    #[must_use]
    pub fn with_busy_timeout_ms(mut self, timeout: u64) -> Self {
        self.busy_timeout_ms = timeout;
        self
    }

    /// Sets whether to create the model tables on startup.
    #[must_use]
    pub fn with_run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Returns `true` for an in-memory database.
    #[must_use]
    pub fn is_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    /// The URL in the form sqlx expects, adding the `sqlite://` scheme to a
    /// bare path.
    #[must_use]
    pub fn connect_url(&self) -> String {
        if self.url.starts_with("sqlite:") {
            self.url.clone()
        } else {
            format!("sqlite://{}", self.url)
        }
    }

    /// Pool size after the in-memory restriction.
    #[must_use]
    pub fn effective_pool_size(&self) -> u32 {
        if self.is_memory() { 1 } else { self.pool_size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SqliteConfig::default();
        assert_eq!(config.url, "sqlite://stubidp.db");
        assert_eq!(config.pool_size, 5);
        assert!(config.create_if_missing);
        assert!(config.run_migrations);
        assert!(!config.is_memory());
    }

    #[test]
    fn test_memory_forces_single_connection() {
        let config = SqliteConfig::in_memory().with_pool_size(8);
        assert!(config.is_memory());
        assert_eq!(config.effective_pool_size(), 1);
        assert_eq!(config.connect_url(), "sqlite::memory:");
    }

    #[test]
    fn test_bare_path_gets_scheme() {
        let config = SqliteConfig::new("./data/oidc.db");
        assert_eq!(config.connect_url(), "sqlite://./data/oidc.db");
        assert_eq!(config.effective_pool_size(), 5);
    }
}
