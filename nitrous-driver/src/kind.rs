//! Runtime driver selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use nitrous_common::{ConnectionOptions, DriverError};

use crate::driver::{BlockingDriver, Driver, RedisDriver, StreamDriver};

/// Which client library backs a driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// `redis` crate multiplexed connection.
    #[default]
    Redis,
    /// Synchronous `redis::Connection` on the blocking pool.
    Blocking,
    /// Multiplexed connection over an adapter-owned socket, watched through events.
    Stream,
}

impl DriverKind {
    pub const ALL: [DriverKind; 3] = [DriverKind::Redis, DriverKind::Blocking, DriverKind::Stream];

    pub fn as_str(self) -> &'static str {
        match self {
            DriverKind::Redis => "redis",
            DriverKind::Blocking => "blocking",
            DriverKind::Stream => "stream",
        }
    }

    /// Builds a driver of this kind. No connection is made until first use.
    pub fn build(self, options: ConnectionOptions) -> Box<dyn Driver> {
        match self {
            DriverKind::Redis => Box::new(RedisDriver::new(options)),
            DriverKind::Blocking => Box::new(BlockingDriver::new(options)),
            DriverKind::Stream => Box::new(StreamDriver::new(options)),
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriverKind {
    type Err = DriverError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        DriverKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| DriverError::UnknownDriverKind(raw.to_string()))
    }
}
