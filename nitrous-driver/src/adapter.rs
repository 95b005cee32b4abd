//! # Client Adapter Contract
//!
//! One implementation per client flavour. An adapter is only constructed
//! through `connect`, which also subscribes the library's closed-state
//! notification exactly once when the library has one. From then on the
//! adapter reports replies in
//! their raw normalized shape (status strings, integer counts) and leaves
//! boolean interpretation to the driver.

use std::sync::Arc;

use async_trait::async_trait;
use nitrous_common::{ConnectionOptions, DriverResult};

use crate::lifecycle::Lifecycle;

/// Normalized asynchronous operation set over one client library.
#[async_trait]
pub trait ClientAdapter: Send + Sync + Sized + 'static {
    /// Short identifier used in logs.
    const NAME: &'static str;

    /// Creates and connects the client, wiring its end notification into
    /// `lifecycle`. A connection that is found gone by a call is reported as
    /// `DriverError::ConnectionClosed`.
    async fn connect(options: &ConnectionOptions, lifecycle: Arc<Lifecycle>) -> DriverResult<Self>;

    /// Expects `"PONG"`.
    async fn ping(&self) -> DriverResult<String>;

    /// Keys matching a glob pattern, in no particular order.
    async fn keys_matching(&self, pattern: &str) -> DriverResult<Vec<String>>;

    /// Number of `keys` present.
    async fn exists(&self, keys: &[String]) -> DriverResult<i64>;

    /// `None` for a missing key.
    async fn get(&self, key: &str) -> DriverResult<Option<String>>;

    /// Status reply, `"OK"` on success.
    async fn set_plain(&self, key: &str, value: &str) -> DriverResult<String>;

    /// Value and TTL written by a single command.
    async fn set_with_expiry(&self, key: &str, value: &str, ttl_seconds: u64) -> DriverResult<String>;

    /// Remaining seconds, `-1` without TTL, `-2` when missing.
    async fn ttl(&self, key: &str) -> DriverResult<i64>;

    /// `1` when the TTL was set, `0` when the key is missing.
    async fn expire(&self, key: &str, ttl_seconds: u64) -> DriverResult<i64>;

    /// Number of keys removed.
    async fn delete(&self, keys: &[String]) -> DriverResult<i64>;

    /// Status reply, `"OK"` on success. Closure follows, possibly later.
    async fn quit(&self) -> DriverResult<String>;

    /// The adapter's view of the closed state.
    ///
    /// Adapters whose library only signals closure through an event return
    /// the last latched value, which can lag behind a completed `quit`.
    fn is_closed(&self) -> bool;
}
