//! Server configuration, read from environment variables

use std::time::Duration;
use thiserror::Error;

/// Store URL selecting [`crate::db::MemoryOrderStore`]
pub const MEMORY_STORE_URL: &str = "memory://";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value {value:?}: expected {expected}")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Order service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL, or `memory://`
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    /// HTTP port
    pub http_port: u16,
    /// TCP ingest listen address; `None` disables ingestion
    pub ingest_addr: Option<String>,
    /// Maximum number of cached orders
    pub cache_capacity: usize,
    /// Orders loaded into the cache at startup
    pub cache_warmup_limit: usize,
    /// How long in-flight work may run after a shutdown signal
    pub shutdown_grace: Duration,
    /// Environment: development | staging | production
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let cache_capacity =
            parse_or(&lookup, "CACHE_CAPACITY", 1000usize, "a non-negative integer")?;

        Ok(Self {
            database_url,
            db_max_connections: parse_or(
                &lookup,
                "DB_MAX_CONNECTIONS",
                10u32,
                "a positive integer",
            )?,
            db_acquire_timeout: Duration::from_secs(parse_or(
                &lookup,
                "DB_ACQUIRE_TIMEOUT_SECS",
                5u64,
                "seconds",
            )?),
            http_port: parse_or(&lookup, "HTTP_PORT", 8080u16, "a port number")?,
            ingest_addr: match lookup("INGEST_ADDR") {
                Some(addr) if addr.trim().is_empty() => None,
                Some(addr) => Some(addr),
                None => Some("0.0.0.0:9092".to_string()),
            },
            cache_capacity,
            cache_warmup_limit: parse_or(
                &lookup,
                "CACHE_WARMUP_LIMIT",
                cache_capacity,
                "a non-negative integer",
            )?,
            shutdown_grace: Duration::from_secs(parse_or(
                &lookup,
                "SHUTDOWN_GRACE_SECS",
                5u64,
                "seconds",
            )?),
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".into()),
        })
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == MEMORY_STORE_URL
    }
}

/// Parse `name` when set, fall back to `default` when unset or empty
fn parse_or<F, T>(
    lookup: &F,
    name: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => {
            value.trim().parse().map_err(|_| ConfigError::Invalid {
                name,
                value,
                expected,
            })
        }
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/orders")]).unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.db_acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.ingest_addr.as_deref(), Some("0.0.0.0:9092"));
        assert_eq!(config.cache_capacity, 1000);
        assert_eq!(config.cache_warmup_limit, 1000);
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
        assert_eq!(config.environment, "development");
        assert!(!config.uses_memory_store());
    }

    #[test]
    fn test_database_url_required() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::Missing("DATABASE_URL"));
        assert_eq!(
            load(&[("DATABASE_URL", "")]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );
    }

    #[test]
    fn test_warmup_limit_follows_capacity() {
        let config = load(&[("DATABASE_URL", "memory://"), ("CACHE_CAPACITY", "50")]).unwrap();
        assert_eq!(config.cache_capacity, 50);
        assert_eq!(config.cache_warmup_limit, 50);
        assert!(config.uses_memory_store());

        let config = load(&[
            ("DATABASE_URL", "memory://"),
            ("CACHE_CAPACITY", "50"),
            ("CACHE_WARMUP_LIMIT", "0"),
        ])
        .unwrap();
        assert_eq!(config.cache_warmup_limit, 0);
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let err = load(&[("DATABASE_URL", "memory://"), ("CACHE_CAPACITY", "-1")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "CACHE_CAPACITY",
                ..
            }
        ));

        let err = load(&[("DATABASE_URL", "memory://"), ("HTTP_PORT", "99999")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "HTTP_PORT", .. }));
    }

    #[test]
    fn test_empty_ingest_addr_disables_ingestion() {
        let config = load(&[("DATABASE_URL", "memory://"), ("INGEST_ADDR", "")]).unwrap();
        assert!(config.ingest_addr.is_none());
    }
}
