//! # Driver Contract
//!
//! `Driver` is what the cache facade calls. `CacheDriver<A>` implements it for
//! any `ClientAdapter`, owning the lazy client and its lifecycle.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, trace, warn};

use nitrous_common::{ConnectionOptions, DriverError, DriverResult, Keys, ALL_KEYS, PONG, STATUS_OK};

use crate::adapter::ClientAdapter;
use crate::adapters::{BlockingAdapter, RedisAdapter, StreamAdapter};
use crate::lifecycle::{CloseCause, Lifecycle, LifecycleState};

/// Normalized cache operations consumed by the facade.
///
/// Object safe, so facades can hold a `Box<dyn Driver>` chosen at runtime.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Adapter identifier.
    fn name(&self) -> &'static str;

    /// All keys, in no particular order.
    async fn keys(&self) -> DriverResult<Vec<String>>;

    async fn has(&self, key: &str) -> DriverResult<bool>;

    /// `None` when the key is missing.
    async fn get(&self, key: &str) -> DriverResult<Option<String>>;

    /// Writes `value`; with `ttl` the value and expiry are set atomically.
    /// Returns true iff the store acknowledged with `OK`.
    async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> DriverResult<bool>;

    /// Remaining seconds; `-1` without TTL, `-2` for a missing key.
    async fn ttl(&self, key: &str) -> DriverResult<i64>;

    /// Returns false when the key does not exist.
    async fn expire(&self, key: &str, ttl: u64) -> DriverResult<bool>;

    /// Removes one or more keys, returning how many existed.
    async fn delete(&self, keys: Keys) -> DriverResult<i64>;

    /// Asks the store to close the connection. Returns true iff it answered `OK`.
    async fn close(&self) -> DriverResult<bool>;

    /// Whether the connection has terminated.
    ///
    /// Event-driven adapters may report `false` for a short while after
    /// `close()` resolves; await `close()` rather than polling this.
    fn is_closed(&self) -> bool;

    /// Liveness probe. Never fails: any error counts as not connected.
    async fn is_connected(&self) -> bool;

    /// Who closed the connection, once closed.
    fn close_cause(&self) -> Option<CloseCause>;

    /// Current lifecycle state.
    fn state(&self) -> LifecycleState;
}

/// Driver over the `redis` crate's multiplexed connection.
pub type RedisDriver = CacheDriver<RedisAdapter>;

/// Driver over a synchronous `redis::Connection`.
pub type BlockingDriver = CacheDriver<BlockingAdapter>;

/// Driver over a self-managed socket that reports its end as an event.
pub type StreamDriver = CacheDriver<StreamAdapter>;

/// `Driver` implementation shared by every adapter.
///
/// Constructing a `CacheDriver` performs no I/O. The first operation connects;
/// concurrent first operations wait on the same attempt, so at most one client
/// exists per driver.
pub struct CacheDriver<A: ClientAdapter> {
    options: ConnectionOptions,
    lifecycle: Arc<Lifecycle>,
    client: OnceCell<A>,
}

impl<A: ClientAdapter> CacheDriver<A> {
    pub fn new(options: ConnectionOptions) -> Self {
        CacheDriver {
            options,
            lifecycle: Arc::new(Lifecycle::new()),
            client: OnceCell::new(),
        }
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Returns the live client, connecting on first use.
    async fn client(&self) -> DriverResult<&A> {
        if self.closed() {
            return Err(DriverError::ConnectionClosed);
        }
        self.client
            .get_or_try_init(|| async {
                self.lifecycle.begin_connect();
                debug!(driver = A::NAME, addr = %self.options.addr(), "connecting");
                match A::connect(&self.options, Arc::clone(&self.lifecycle)).await {
                    Ok(client) => {
                        self.lifecycle.connected();
                        Ok(client)
                    }
                    Err(err) => {
                        self.lifecycle.connect_failed();
                        Err(err)
                    }
                }
            })
            .await
    }

    fn closed(&self) -> bool {
        match self.client.get() {
            Some(client) => client.is_closed(),
            None => self.lifecycle.is_closed(),
        }
    }

    /// Undoes `begin_close` after a quit that did not go through. A client
    /// that died along the way stays closed.
    fn reopen_after_failed_close(&self, client: &A) {
        self.lifecycle.abort_close();
        if client.is_closed() {
            self.lifecycle.lost();
        }
    }
}

#[async_trait]
impl<A: ClientAdapter> Driver for CacheDriver<A> {
    fn name(&self) -> &'static str {
        A::NAME
    }

    async fn keys(&self) -> DriverResult<Vec<String>> {
        self.client().await?.keys_matching(ALL_KEYS).await
    }

    async fn has(&self, key: &str) -> DriverResult<bool> {
        let present = self.client().await?.exists(&[key.to_string()]).await?;
        Ok(present > 0)
    }

    async fn get(&self, key: &str) -> DriverResult<Option<String>> {
        self.client().await?.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> DriverResult<bool> {
        let client = self.client().await?;
        let status = match ttl {
            Some(seconds) => client.set_with_expiry(key, value, seconds).await?,
            None => client.set_plain(key, value).await?,
        };
        trace!(driver = A::NAME, key, ?ttl, %status, "set");
        Ok(status == STATUS_OK)
    }

    async fn ttl(&self, key: &str) -> DriverResult<i64> {
        self.client().await?.ttl(key).await
    }

    async fn expire(&self, key: &str, ttl: u64) -> DriverResult<bool> {
        let updated = self.client().await?.expire(key, ttl).await?;
        Ok(updated == 1)
    }

    async fn delete(&self, keys: Keys) -> DriverResult<i64> {
        let client = self.client().await?;
        if keys.is_empty() {
            return Ok(0);
        }
        client.delete(keys.as_slice()).await
    }

    async fn close(&self) -> DriverResult<bool> {
        let client = self.client().await?;
        if !self.lifecycle.begin_close() {
            return Err(DriverError::ConnectionClosed);
        }
        match client.quit().await {
            Ok(status) if status == STATUS_OK => Ok(true),
            Ok(status) => {
                warn!(driver = A::NAME, %status, "quit was not acknowledged");
                self.reopen_after_failed_close(client);
                Ok(false)
            }
            Err(err) => {
                self.reopen_after_failed_close(client);
                Err(err)
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed()
    }

    async fn is_connected(&self) -> bool {
        if self.closed() {
            return false;
        }
        let client = match self.client().await {
            Ok(client) => client,
            Err(err) => {
                debug!(driver = A::NAME, error = %err, "liveness probe could not connect");
                return false;
            }
        };
        match client.ping().await {
            Ok(reply) => reply == PONG,
            Err(err) => {
                debug!(driver = A::NAME, error = %err, "liveness probe failed");
                false
            }
        }
    }

    fn close_cause(&self) -> Option<CloseCause> {
        self.lifecycle.close_cause()
    }

    fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }
}
