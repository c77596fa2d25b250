use std::time::Duration;

use clearwave_core::upload::DEFAULT_MAX_UPLOAD_BYTES;
use clearwave_enhancer::EnhancerConfig;
use clearwave_worker::DispatcherConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `60`).
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// SQLite connection URL (default: `sqlite://clearwave.db`).
    pub database_url: String,
    /// Largest accepted upload in bytes (default: 50 MiB).
    pub max_upload_bytes: usize,
    /// Concurrent enhancement jobs (default: `2`).
    pub worker_concurrency: usize,
    /// Jobs that may wait for a worker (default: `64`).
    pub queue_capacity: usize,
    /// Upper bound on one model call in seconds (default: `120`).
    pub enhance_timeout_secs: u64,
    pub enhancer: EnhancerConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                  |
    /// |-------------------------|--------------------------|
    /// | `HOST`                  | `0.0.0.0`                |
    /// | `PORT`                  | `8000`                   |
    /// | `CORS_ORIGINS`          | `http://localhost:8000`  |
    /// | `REQUEST_TIMEOUT_SECS`  | `60`                     |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                     |
    /// | `DATABASE_URL`          | `sqlite://clearwave.db`  |
    /// | `MAX_UPLOAD_BYTES`      | `52428800`               |
    /// | `WORKER_CONCURRENCY`    | `2`                      |
    /// | `QUEUE_CAPACITY`        | `64`                     |
    /// | `ENHANCE_TIMEOUT_SECS`  | `120`                    |
    ///
    /// The enhancer backend is read by [`EnhancerConfig::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = parse_var("PORT", "8000");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:8000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://clearwave.db".into());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", "60"),
            shutdown_timeout_secs: parse_var("SHUTDOWN_TIMEOUT_SECS", "30"),
            database_url,
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", &DEFAULT_MAX_UPLOAD_BYTES.to_string()),
            worker_concurrency: parse_var("WORKER_CONCURRENCY", "2"),
            queue_capacity: parse_var("QUEUE_CAPACITY", "64"),
            enhance_timeout_secs: parse_var("ENHANCE_TIMEOUT_SECS", "120"),
            enhancer: EnhancerConfig::from_env(),
        }
    }

    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            workers: self.worker_concurrency,
            queue_capacity: self.queue_capacity,
        }
    }

    pub fn enhance_timeout(&self) -> Duration {
        Duration::from_secs(self.enhance_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Read and parse `key`, falling back to `default`. Panics on a value that
/// does not parse, so misconfiguration fails at startup.
fn parse_var<T>(key: &str, default: &str) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .unwrap_or_else(|e| panic!("{key} must be a valid {}: {e}", std::any::type_name::<T>()))
}
