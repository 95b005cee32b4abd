//! # Blocking Client Adapter
//!
//! Binds the driver to the synchronous `redis::Connection`. Every call is
//! moved onto the runtime's blocking pool by `call`, the single place where
//! the blocking convention is turned into a future.
//!
//! A blocking connection has no reader of its own, so a peer hangup is only
//! seen by the next call that touches the socket. That call fails with
//! `ConnectionClosed` and latches the closed flag as a peer close. Any I/O
//! failure, a response timeout included, retires the connection the same way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use redis::{Cmd, Connection, FromRedisValue, RedisError, RedisResult};
use tracing::warn;

use nitrous_common::{ConnectionOptions, DriverError, DriverResult, STATUS_OK};

use super::{command, connection_info, is_disconnect, redis_error};
use crate::adapter::ClientAdapter;
use crate::lifecycle::Lifecycle;

/// Adapter over a blocking `redis::Connection`.
pub struct BlockingAdapter {
    conn: Arc<Mutex<Connection>>,
    closed: AtomicBool,
    lifecycle: Arc<Lifecycle>,
}

impl BlockingAdapter {
    /// Runs one blocking command off the async workers.
    async fn call<T>(&self, command: &'static str, cmd: Cmd) -> DriverResult<T>
    where
        T: FromRedisValue + Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(DriverError::ConnectionClosed);
        }
        let conn = Arc::clone(&self.conn);
        let reply = tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().expect("connection mutex poisoned");
            cmd.query::<T>(&mut *conn)
        })
        .await
        .map_err(|err| DriverError::Runtime(err.to_string()))?;
        reply.map_err(|err| self.failure(command, err))
    }

    fn failure(&self, command: &'static str, err: RedisError) -> DriverError {
        if is_disconnect(&err) && !self.closed.swap(true, Ordering::AcqRel) {
            // No end event exists here; the failing call is the only signal,
            // and a dead socket during QUIT is not a confirmed close.
            if let Some(cause) = self.lifecycle.lost() {
                warn!(command, error = %err, ?cause, "blocking connection dropped");
            }
        }
        redis_error(command, err)
    }
}

fn open(
    options: &ConnectionOptions,
) -> impl FnOnce() -> RedisResult<Connection> + Send + 'static {
    let info = connection_info(options);
    let connect_timeout = options.connect_timeout();
    let response_timeout: Option<Duration> = options.response_timeout();
    move || {
        let client = redis::Client::open(info)?;
        let conn = client.get_connection_with_timeout(connect_timeout)?;
        conn.set_read_timeout(response_timeout)?;
        conn.set_write_timeout(response_timeout)?;
        Ok(conn)
    }
}

#[async_trait]
impl ClientAdapter for BlockingAdapter {
    const NAME: &'static str = "blocking";

    async fn connect(options: &ConnectionOptions, lifecycle: Arc<Lifecycle>) -> DriverResult<Self> {
        let addr = options.addr();
        let conn = tokio::task::spawn_blocking(open(options))
            .await
            .map_err(|err| DriverError::Runtime(err.to_string()))?
            .map_err(|err| DriverError::connect(addr, err))?;

        Ok(BlockingAdapter {
            conn: Arc::new(Mutex::new(conn)),
            closed: AtomicBool::new(false),
            lifecycle,
        })
    }

    async fn ping(&self) -> DriverResult<String> {
        self.call("PING", command::ping()).await
    }

    async fn keys_matching(&self, pattern: &str) -> DriverResult<Vec<String>> {
        self.call("KEYS", command::keys(pattern)).await
    }

    async fn exists(&self, keys: &[String]) -> DriverResult<i64> {
        self.call("EXISTS", command::exists(keys)).await
    }

    async fn get(&self, key: &str) -> DriverResult<Option<String>> {
        self.call("GET", command::get(key)).await
    }

    async fn set_plain(&self, key: &str, value: &str) -> DriverResult<String> {
        self.call("SET", command::set(key, value)).await
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl_seconds: u64) -> DriverResult<String> {
        self.call("SET", command::set_ex(key, value, ttl_seconds)).await
    }

    async fn ttl(&self, key: &str) -> DriverResult<i64> {
        self.call("TTL", command::ttl(key)).await
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> DriverResult<i64> {
        self.call("EXPIRE", command::expire(key, ttl_seconds)).await
    }

    async fn delete(&self, keys: &[String]) -> DriverResult<i64> {
        self.call("DEL", command::del(keys)).await
    }

    async fn quit(&self) -> DriverResult<String> {
        let status: String = self.call("QUIT", command::quit()).await?;
        if status == STATUS_OK {
            self.closed.store(true, Ordering::Release);
            self.lifecycle.close_confirmed();
        }
        Ok(status)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
