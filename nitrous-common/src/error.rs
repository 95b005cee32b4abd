//! # Driver Errors
//!
//! Purpose: Give every adapter one error vocabulary so the cache facade never
//! has to know which client library produced a failure.
//!
//! ## Taxonomy
//!
//! - `ConnectionClosed`: the driver (or its client) is already closed.
//! - `Connect`: lazy connection establishment failed.
//! - `Remote`: the client call itself failed (I/O, server error, auth).
//! - `UnexpectedReply`: the library answered with a shape the adapter cannot map.
//! - `Runtime`: the task executing a blocking call did not complete.
//! - `UnknownDriverKind`: a driver name that no adapter answers to.
//!
//! Literal mismatches such as a status other than `OK` are not errors; the
//! driver turns them into `false`.

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed source error carried by remote and connect failures.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type used across the driver layer.
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors surfaced by a driver to its caller.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The connection was closed by the user or the peer.
    #[error("connection is closed")]
    ConnectionClosed,

    /// Establishing the connection failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: BoxError,
    },

    /// The underlying client call failed.
    #[error("{command} failed: {source}")]
    Remote {
        command: &'static str,
        #[source]
        source: BoxError,
    },

    /// The reply could not be mapped onto the driver contract.
    #[error("unexpected reply to {command}: {reply}")]
    UnexpectedReply {
        command: &'static str,
        reply: String,
    },

    /// A blocking call could not be driven to completion.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// A driver selection string did not name a known adapter.
    #[error("unknown driver kind: {0}")]
    UnknownDriverKind(String),
}

impl DriverError {
    /// Wraps a client failure for `command`.
    pub fn remote<E>(command: &'static str, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        DriverError::Remote {
            command,
            source: source.into(),
        }
    }

    /// Wraps a connect failure for `addr`.
    pub fn connect<E>(addr: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        DriverError::Connect {
            addr: addr.into(),
            source: source.into(),
        }
    }

    /// Returns true for `ConnectionClosed`.
    pub fn is_closed(&self) -> bool {
        matches!(self, DriverError::ConnectionClosed)
    }
}
