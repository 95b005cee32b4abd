//! # Redis Crate Adapter
//!
//! Binds the driver to `redis::aio::MultiplexedConnection`. The connection is
//! async-native, so calls map one-to-one onto commands. Closure is tracked by
//! a direct open flag: a confirmed QUIT clears it synchronously, and so does
//! the end of the connection's driver future, which this adapter runs on its
//! own task to see a peer hangup without waiting for the next call.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Cmd, FromRedisValue, RedisError, RedisResult};
use tracing::{debug, warn};

use nitrous_common::{ConnectionOptions, DriverError, DriverResult, STATUS_OK};

use super::{command, connection_info, is_disconnect, redis_error};
use crate::adapter::ClientAdapter;
use crate::lifecycle::Lifecycle;

/// Adapter over the `redis` crate.
pub struct RedisAdapter {
    conn: MultiplexedConnection,
    open: Arc<AtomicBool>,
    lifecycle: Arc<Lifecycle>,
    response_timeout: Option<Duration>,
}

impl RedisAdapter {
    async fn query<T>(&self, command: &'static str, cmd: Cmd) -> DriverResult<T>
    where
        T: FromRedisValue + Send,
    {
        if !self.open.load(Ordering::Acquire) {
            return Err(DriverError::ConnectionClosed);
        }
        let mut conn = self.conn.clone();
        let reply: RedisResult<T> = match self.response_timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.query_async(&mut conn))
                .await
                .map_err(|_| DriverError::remote(command, "response timed out"))?,
            None => cmd.query_async(&mut conn).await,
        };
        reply.map_err(|err| self.failure(command, err))
    }

    fn failure(&self, command: &'static str, err: RedisError) -> DriverError {
        if is_disconnect(&err) {
            self.open.store(false, Ordering::Release);
            if let Some(cause) = self.lifecycle.lost() {
                warn!(command, error = %err, ?cause, "redis connection dropped");
            }
        }
        redis_error(command, err)
    }
}

/// Runs the connection until the socket ends, then latches the open flag.
async fn drive<F>(driver: F, open: Arc<AtomicBool>, lifecycle: Arc<Lifecycle>)
where
    F: Future<Output = ()>,
{
    driver.await;
    open.store(false, Ordering::Release);
    if let Some(cause) = lifecycle.disconnected() {
        debug!(?cause, "redis connection ended");
    }
}

#[async_trait]
impl ClientAdapter for RedisAdapter {
    const NAME: &'static str = "redis";

    async fn connect(options: &ConnectionOptions, lifecycle: Arc<Lifecycle>) -> DriverResult<Self> {
        let addr = options.addr();
        let client = redis::Client::open(connection_info(options))
            .map_err(|err| DriverError::connect(addr.clone(), err))?;
        let (conn, driver) = tokio::time::timeout(
            options.connect_timeout(),
            client.create_multiplexed_tokio_connection(),
        )
        .await
        .map_err(|_| DriverError::connect(addr.clone(), "connect timed out"))?
        .map_err(|err| DriverError::connect(addr, err))?;

        let open = Arc::new(AtomicBool::new(true));
        tokio::spawn(drive(driver, Arc::clone(&open), Arc::clone(&lifecycle)));

        Ok(RedisAdapter {
            conn,
            open,
            lifecycle,
            response_timeout: options.response_timeout(),
        })
    }

    async fn ping(&self) -> DriverResult<String> {
        self.query("PING", command::ping()).await
    }

    async fn keys_matching(&self, pattern: &str) -> DriverResult<Vec<String>> {
        self.query("KEYS", command::keys(pattern)).await
    }

    async fn exists(&self, keys: &[String]) -> DriverResult<i64> {
        self.query("EXISTS", command::exists(keys)).await
    }

    async fn get(&self, key: &str) -> DriverResult<Option<String>> {
        self.query("GET", command::get(key)).await
    }

    async fn set_plain(&self, key: &str, value: &str) -> DriverResult<String> {
        self.query("SET", command::set(key, value)).await
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl_seconds: u64) -> DriverResult<String> {
        self.query("SET", command::set_ex(key, value, ttl_seconds)).await
    }

    async fn ttl(&self, key: &str) -> DriverResult<i64> {
        self.query("TTL", command::ttl(key)).await
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> DriverResult<i64> {
        self.query("EXPIRE", command::expire(key, ttl_seconds)).await
    }

    async fn delete(&self, keys: &[String]) -> DriverResult<i64> {
        self.query("DEL", command::del(keys)).await
    }

    async fn quit(&self) -> DriverResult<String> {
        let status: String = self.query("QUIT", command::quit()).await?;
        // The multiplexed connection confirms synchronously; the driver
        // future ending afterwards is ignored while closing.
        if status == STATUS_OK {
            self.open.store(false, Ordering::Release);
            self.lifecycle.close_confirmed();
        }
        Ok(status)
    }

    fn is_closed(&self) -> bool {
        !self.open.load(Ordering::Acquire)
    }
}
