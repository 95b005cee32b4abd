//! # Connection Options
//!
//! Purpose: Carry host, port and credentials to whichever client library a
//! driver wraps. The options are forwarded, never validated beyond building an
//! address string.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default store host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default store port.
pub const DEFAULT_PORT: u16 = 6379;

/// Default connect timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Options used to reach the remote store.
///
/// Every field has a default, so partial JSON/TOML blobs deserialize cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Store hostname or IP address.
    pub host: String,
    /// Store TCP port.
    pub port: u16,
    /// ACL username, sent with the password when present.
    pub username: Option<String>,
    /// Password used for AUTH.
    pub password: Option<String>,
    /// Logical database selected after connecting.
    pub database: i64,
    /// Upper bound for establishing the TCP connection.
    pub connect_timeout_ms: u64,
    /// Optional upper bound for a single command round trip.
    pub response_timeout_ms: Option<u64>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        ConnectionOptions {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            username: None,
            password: None,
            database: 0,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            response_timeout_ms: None,
        }
    }
}

impl ConnectionOptions {
    /// Builds options for `host:port` with defaults for everything else.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ConnectionOptions {
            host: host.into(),
            port,
            ..ConnectionOptions::default()
        }
    }

    /// Reads `REDIS_HOST`, `REDIS_PORT`, `REDIS_USERNAME`, `REDIS_PASSWORD`
    /// and `REDIS_DB`. Missing or unparsable values fall back to defaults.
    pub fn from_env() -> Self {
        let defaults = ConnectionOptions::default();
        ConnectionOptions {
            host: env::var("REDIS_HOST").unwrap_or(defaults.host),
            port: parse_env("REDIS_PORT").unwrap_or(defaults.port),
            username: env::var("REDIS_USERNAME").ok(),
            password: env::var("REDIS_PASSWORD").ok(),
            database: parse_env("REDIS_DB").unwrap_or(defaults.database),
            ..defaults
        }
    }

    /// Returns `host:port`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|raw| raw.trim().parse().ok())
}
