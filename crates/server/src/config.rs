// Server configuration.
//
// Centralizes environment variable parsing with defaults for local
// development.

use std::{net::SocketAddr, time::Duration};

const DEV_JWT_SECRET: &str = "gamehub_local_development_jwt_secret_must_be_32_chars";
pub(crate) const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 256;
pub(crate) const DEFAULT_MAX_FRAME_BYTES: usize = 65_536;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Core server configuration.
///
/// Constructed via [`ServerConfig::from_env`] which reads environment
/// variables and falls back to development defaults.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (host:port).
    pub listen_addr: SocketAddr,
    /// JWT signing secret for access tokens.
    pub jwt_secret: String,
    /// Comma-separated CORS origins (or `"*"` for any).
    pub cors_origins: Option<String>,
    /// Log filter directive (e.g. `info`, `gamehub_server=debug`).
    pub log_filter: String,
    pub log_format: LogFormat,
    /// Failed handshake attempts tolerated before the channel is closed.
    /// `None` keeps retrying for as long as the client does.
    pub max_auth_attempts: Option<u32>,
    /// Close a channel that sends nothing for this long. `None` waits forever.
    pub idle_timeout: Option<Duration>,
    /// Frames buffered per connection before it counts as a slow consumer.
    pub outbound_queue_capacity: usize,
    pub max_frame_bytes: usize,
}

impl ServerConfig {
    /// Parse configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `GAMEHUB_HOST` | `0.0.0.0` |
    /// | `GAMEHUB_PORT` | `8080` |
    /// | `GAMEHUB_JWT_SECRET` | dev-only placeholder |
    /// | `GAMEHUB_CORS_ORIGINS` | *(unset: localhost dev origins)* |
    /// | `GAMEHUB_LOG_FILTER` | `info` |
    /// | `GAMEHUB_LOG_FORMAT` | `text` |
    /// | `GAMEHUB_MAX_AUTH_ATTEMPTS` | *(unset: unbounded)* |
    /// | `GAMEHUB_IDLE_TIMEOUT_SECS` | *(unset: no timeout)* |
    /// | `GAMEHUB_OUTBOUND_QUEUE_CAPACITY` | `256` |
    /// | `GAMEHUB_MAX_FRAME_BYTES` | `65536` |
    pub fn from_env() -> Self {
        Self::from_env_fn(|key| std::env::var(key))
    }

    /// Testable constructor that accepts an environment lookup function.
    fn from_env_fn<F>(env: F) -> Self
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        let host = env("GAMEHUB_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env("GAMEHUB_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8080);
        let listen_addr = format!("{host}:{port}")
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));

        let jwt_secret = env("GAMEHUB_JWT_SECRET").unwrap_or_else(|_| DEV_JWT_SECRET.into());
        let cors_origins = env("GAMEHUB_CORS_ORIGINS").ok();
        let log_filter = env("GAMEHUB_LOG_FILTER").unwrap_or_else(|_| "info".into());
        let log_format = match env("GAMEHUB_LOG_FORMAT").ok().as_deref().map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let max_auth_attempts = env("GAMEHUB_MAX_AUTH_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|attempts| *attempts > 0);
        let idle_timeout = env("GAMEHUB_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        let outbound_queue_capacity = env("GAMEHUB_OUTBOUND_QUEUE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|capacity| *capacity > 0)
            .unwrap_or(DEFAULT_OUTBOUND_QUEUE_CAPACITY);
        let max_frame_bytes = env("GAMEHUB_MAX_FRAME_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|bytes| *bytes > 0)
            .unwrap_or(DEFAULT_MAX_FRAME_BYTES);

        Self {
            listen_addr,
            jwt_secret,
            cors_origins,
            log_filter,
            log_format,
            max_auth_attempts,
            idle_timeout,
            outbound_queue_capacity,
            max_frame_bytes,
        }
    }

    /// Returns true when using the development-only JWT secret.
    pub fn is_dev_jwt_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}
