use serde::{Deserialize, Serialize};
use stubidp_storage::SqlDialect;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Provider validations
        let issuer = Url::parse(&self.provider.issuer)
            .map_err(|e| format!("provider.issuer must be a valid URL: {e}"))?;
        if !matches!(issuer.scheme(), "http" | "https") {
            return Err("provider.issuer must use http or https".into());
        }
        // Database validations
        if let Some(dialect) = self.database.dialect
            && self.database.url.as_deref().unwrap_or("").is_empty()
        {
            return Err(format!(
                "database.url is required when database.dialect is {dialect}"
            ));
        }
        if self.database.pool_size == 0 {
            return Err("database.pool_size must be > 0".into());
        }
        if self.database.connect_timeout_ms == 0 {
            return Err("database.connect_timeout_ms must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        if !VALID_LOG_LEVELS.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {VALID_LOG_LEVELS:?}"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Public issuer identifier, e.g. `https://idp.example.com`.
    #[serde(default = "default_issuer")]
    pub issuer: String,
    /// Enables the engine's built-in login and consent pages.
    #[serde(default = "default_true")]
    pub dev_interactions: bool,
}

fn default_issuer() -> String {
    "http://localhost:3000".into()
}
fn default_true() -> bool {
    true
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            dev_interactions: true,
        }
    }
}

/// Persistence settings. Without a dialect no adapter is configured and the
/// engine keeps its state in process memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub dialect: Option<SqlDialect>,
    /// Connection URL for PostgreSQL, or database URL/path for SQLite.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Create missing tables on startup.
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_pool_size() -> u32 {
    10
}
fn default_connect_timeout() -> u64 {
    5000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            dialect: None,
            url: None,
            pool_size: default_pool_size(),
            connect_timeout_ms: default_connect_timeout(),
            run_migrations: true,
        }
    }
}

pub const VALID_LOG_LEVELS: [&str; 8] = [
    "trace", "debug", "info", "warn", "error", "fatal", "off", "silent",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// The level as an `EnvFilter` directive.
    pub fn filter_directive(&self) -> String {
        level_directive(&self.level)
    }
}

/// Maps a configured level to an `EnvFilter` directive. `fatal` and `silent`
/// are accepted for compatibility and map to `error` and `off`.
pub fn level_directive(level: &str) -> String {
    match level.to_ascii_lowercase().as_str() {
        "fatal" => "error".into(),
        "silent" => "off".into(),
        other => other.into(),
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, ConfigError, Environment, File};
    use std::env;
    use std::path::{Path, PathBuf};

    /// Unprefixed variables honoured for compatibility, mapped to their keys.
    pub const LEGACY_ENV_VARS: [(&str, &str); 4] = [
        ("DATABASE_DIALECT", "database.dialect"),
        ("DATABASE_URL", "database.url"),
        ("OIDC_ISSUER", "provider.issuer"),
        ("LOG_LEVEL", "logging.level"),
    ];

    /// Loads configuration from, in increasing precedence: the TOML file,
    /// `STUBIDP__SECTION__KEY` variables, then the legacy variables.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                // Try default root-level file
                let default_path = PathBuf::from("stubidp.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., STUBIDP__DATABASE__POOL_SIZE=4
        builder = builder.add_source(
            Environment::with_prefix("STUBIDP")
                .try_parsing(true)
                .separator("__"),
        );
        for (var, key) in LEGACY_ENV_VARS {
            let value = env::var(var).ok().filter(|v| !v.is_empty());
            builder = builder
                .set_override_option(key, value)
                .map_err(|e: ConfigError| format!("config override error for {var}: {e}"))?;
        }
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        // Validate
        merged.validate()?;
        Ok(merged)
    }

    pub fn load_config_with_default_path<P: AsRef<Path>>(
        path: Option<P>,
    ) -> Result<AppConfig, String> {
        let p = path
            .as_ref()
            .map(|p| p.as_ref().to_string_lossy().to_string());
        load_config(p.as_deref())
    }

    /// Loads `.env` from the working directory if present.
    ///
    /// A missing file is not an error; any other failure is returned.
    pub fn load_dotenv() -> Result<(), String> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(()),
            Err(dotenvy::Error::Io(ref io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {
                Ok(())
            }
            Err(e) => Err(format!("failed to load .env file: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.provider.issuer, "http://localhost:3000");
        assert!(cfg.provider.dev_interactions);
        assert!(cfg.database.dialect.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_dialect_requires_url() {
        let mut cfg = AppConfig::default();
        cfg.database.dialect = Some(SqlDialect::Sqlite);
        let err = cfg.validate().expect_err("url missing");
        assert!(err.contains("database.url is required"));

        cfg.database.url = Some("sqlite::memory:".into());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_invalid_values() {
        let mut cfg = AppConfig::default();
        cfg.provider.issuer = "not a url".into();
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.provider.issuer = "ftp://idp.example.com".into();
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.database.pool_size = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.logging.level = "verbose".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_log_level_aliases() {
        let fatal = LoggingConfig {
            level: "FATAL".into(),
        };
        assert_eq!(fatal.filter_directive(), "error");
        let silent = LoggingConfig {
            level: "silent".into(),
        };
        assert_eq!(silent.filter_directive(), "off");
        assert_eq!(LoggingConfig::default().filter_directive(), "info");
    }
}
