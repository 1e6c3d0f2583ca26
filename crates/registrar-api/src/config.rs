//! Server configuration read from environment variables.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use registrar_remote::Url;

use crate::error::AppError;

/// Runtime configuration of the API server.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Address the HTTP listener binds to.
    pub listen_addr: SocketAddr,
    /// Base URL of the course catalog service.
    pub catalog_url: Url,
    /// Base URL of the student directory service.
    pub directory_url: Url,
    /// Per-request timeout for catalog and directory calls.
    pub remote_timeout: Duration,
    /// Attempts per remote call, including the first.
    pub remote_retry_attempts: u32,
    /// How often the reconciler replays pending adjustments.
    pub reconcile_interval: Duration,
    /// Pending adjustments replayed per reconciliation cycle.
    pub reconcile_batch_size: usize,
    /// Upper bound of the database pool.
    pub db_max_connections: u32,
    /// OTLP collector endpoint; span export is off when unset.
    pub otlp_endpoint: Option<String>,
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when a required variable is missing or a
    /// value does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when a required key is missing or a value
    /// does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let database_url = required(&lookup, "DATABASE_URL")?;
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned());
        let port: u16 = parsed(&lookup, "PORT", 3000)?;
        let listen_addr = format!("{host}:{port}")
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;

        Ok(Self {
            database_url,
            listen_addr,
            catalog_url: url(&lookup, "CATALOG_SERVICE_URL")?,
            directory_url: url(&lookup, "DIRECTORY_SERVICE_URL")?,
            remote_timeout: Duration::from_millis(parsed(&lookup, "REMOTE_TIMEOUT_MS", 2000)?),
            remote_retry_attempts: parsed(&lookup, "REMOTE_RETRY_ATTEMPTS", 3)?,
            reconcile_interval: Duration::from_secs(parsed(
                &lookup,
                "RECONCILE_INTERVAL_SECS",
                30,
            )?),
            reconcile_batch_size: parsed(&lookup, "RECONCILE_BATCH_SIZE", 50)?,
            db_max_connections: parsed(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|v| !v.trim().is_empty()),
        })
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, AppError> {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("{key} environment variable must be set")))
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}"))),
    }
}

fn url(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Url, AppError> {
    let raw = required(lookup, key)?;
    Url::parse(&raw).map_err(|e| AppError::Config(format!("{key} is not a valid URL: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DATABASE_URL", "postgres://localhost/registrar"),
        ("CATALOG_SERVICE_URL", "http://catalog.local/"),
        ("DIRECTORY_SERVICE_URL", "http://directory.local/"),
    ];

    #[test]
    fn test_defaults_apply_when_only_required_values_are_set() {
        // Arrange
        let lookup = lookup_from(&REQUIRED);

        // Act
        let config = AppConfig::from_lookup(lookup).unwrap();

        // Assert
        assert_eq!(config.listen_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.remote_timeout, Duration::from_millis(2000));
        assert_eq!(config.remote_retry_attempts, 3);
        assert_eq!(config.reconcile_interval, Duration::from_secs(30));
        assert_eq!(config.reconcile_batch_size, 50);
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.otlp_endpoint, None);
        assert_eq!(config.catalog_url.as_str(), "http://catalog.local/");
    }

    #[test]
    fn test_overrides_are_parsed() {
        // Arrange
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("HOST", "127.0.0.1"),
            ("PORT", "8081"),
            ("REMOTE_TIMEOUT_MS", "250"),
            ("RECONCILE_BATCH_SIZE", "5"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://collector:4317"),
        ]);

        // Act
        let config = AppConfig::from_lookup(lookup_from(&pairs)).unwrap();

        // Assert
        assert_eq!(config.listen_addr, "127.0.0.1:8081".parse().unwrap());
        assert_eq!(config.remote_timeout, Duration::from_millis(250));
        assert_eq!(config.reconcile_batch_size, 5);
        assert_eq!(config.otlp_endpoint.as_deref(), Some("http://collector:4317"));
    }

    #[test]
    fn test_missing_database_url_is_config_error() {
        let lookup = lookup_from(&REQUIRED[1..]);

        let err = AppConfig::from_lookup(lookup).unwrap_err();

        assert!(matches!(err, AppError::Config(msg) if msg.contains("DATABASE_URL")));
    }

    #[test]
    fn test_unparseable_port_is_config_error() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "eighty"));

        let err = AppConfig::from_lookup(lookup_from(&pairs)).unwrap_err();

        assert!(matches!(err, AppError::Config(msg) if msg.starts_with("PORT")));
    }

    #[test]
    fn test_malformed_service_url_is_config_error() {
        let pairs = [
            ("DATABASE_URL", "postgres://localhost/registrar"),
            ("CATALOG_SERVICE_URL", "not a url"),
            ("DIRECTORY_SERVICE_URL", "http://directory.local/"),
        ];

        let err = AppConfig::from_lookup(lookup_from(&pairs)).unwrap_err();

        assert!(matches!(err, AppError::Config(msg) if msg.contains("CATALOG_SERVICE_URL")));
    }
}
