//! Application configuration loaded from environment variables.

use std::time::Duration;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `text` or `json` (default: `text`)
/// - `DATABASE_URL` — PostgreSQL URL; unset runs on the in-memory store
/// - `DATABASE_MAX_CONNECTIONS` — pool size (default: `10`)
/// - `LOCK_TIMEOUT_MS` — transaction lock timeout (default: `5000`)
/// - `REDIS_URL` — availability broker; unset logs availability instead
/// - `AVAILABILITY_CHANNEL` — broker channel (default: `"stock.available"`)
/// - `INTERNAL_AUTH_TOKEN` — expected `X-Internal-Auth` value
/// - `ADMIN_AUTH_TOKEN` — expected `X-Warehouse-Admin-Auth` value
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub lock_timeout_ms: u64,
    pub redis_url: Option<String>,
    pub availability_channel: String,
    pub internal_auth_token: String,
    pub admin_auth_token: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: non_empty("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: non_empty("LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or(defaults.log_format),
            database_url: non_empty("DATABASE_URL"),
            database_max_connections: non_empty("DATABASE_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.database_max_connections),
            lock_timeout_ms: non_empty("LOCK_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.lock_timeout_ms),
            redis_url: non_empty("REDIS_URL"),
            availability_channel: non_empty("AVAILABILITY_CHANNEL")
                .unwrap_or(defaults.availability_channel),
            internal_auth_token: non_empty("INTERNAL_AUTH_TOKEN")
                .unwrap_or(defaults.internal_auth_token),
            admin_auth_token: non_empty("ADMIN_AUTH_TOKEN").unwrap_or(defaults.admin_auth_token),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 10,
            lock_timeout_ms: 5000,
            redis_url: None,
            availability_channel: "stock.available".to_string(),
            internal_auth_token: "internal-secret".to_string(),
            admin_auth_token: "admin-secret".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.database_url.is_none());
        assert_eq!(config.lock_timeout(), Duration::from_secs(5));
        assert_eq!(config.availability_channel, "stock.available");
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8081"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/inventory"),
            ("LOCK_TIMEOUT_MS", "250"),
            ("INTERNAL_AUTH_TOKEN", "s3cret"),
        ]));
        assert_eq!(config.port, 8081);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/inventory")
        );
        assert_eq!(config.lock_timeout(), Duration::from_millis(250));
        assert_eq!(config.internal_auth_token, "s3cret");
        assert_eq!(config.admin_auth_token, "admin-secret");
    }

    #[test]
    fn test_ignores_blank_and_malformed_values() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "not-a-port"),
            ("DATABASE_URL", "  "),
            ("DATABASE_MAX_CONNECTIONS", "-1"),
        ]));
        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
        assert_eq!(config.database_max_connections, 10);
    }
}
