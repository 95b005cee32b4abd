//! # Stream Adapter
//!
//! Opens the TCP socket itself and runs the `redis` multiplexed protocol over
//! it. The socket's life is published as `ClientEvent`s on a broadcast
//! channel. The adapter subscribes before the socket opens, so no event can be
//! missed, then hands the receiver to a watcher task. The watcher latches the
//! closed flag on `End` and exits, dropping its subscription.
//!
//! Calls never touch the lifecycle here: only `End` does, so a close that
//! races a hangup resolves to whichever the event stream reports.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Cmd, FromRedisValue, RedisResult};
use tokio::net::TcpStream;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, trace, warn};

use nitrous_common::{ConnectionOptions, DriverError, DriverResult};

use super::{command, connection_info, is_disconnect, redis_error};
use crate::adapter::ClientAdapter;
use crate::lifecycle::Lifecycle;

const EVENT_CAPACITY: usize = 16;

/// Socket lifecycle notifications, in the order a connection emits them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// TCP connection established.
    Connect,
    /// Handshake done; commands may flow.
    Ready,
    /// A call failed because the socket broke.
    Error(String),
    /// The socket is gone. Always the last event.
    End,
}

/// Adapter over a self-managed socket.
pub struct StreamAdapter {
    conn: MultiplexedConnection,
    events: broadcast::Sender<ClientEvent>,
    closed: Arc<AtomicBool>,
    response_timeout: Option<Duration>,
}

impl StreamAdapter {
    /// Subscribes to the socket's remaining events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    async fn send<T>(&self, command: &'static str, cmd: Cmd) -> DriverResult<T>
    where
        T: FromRedisValue + Send,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(DriverError::ConnectionClosed);
        }
        let mut conn = self.conn.clone();
        let reply: RedisResult<T> = match self.response_timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.query_async(&mut conn))
                .await
                .map_err(|_| DriverError::remote(command, "response timed out"))?,
            None => cmd.query_async(&mut conn).await,
        };
        reply.map_err(|err| {
            if is_disconnect(&err) {
                let _ = self.events.send(ClientEvent::Error(err.to_string()));
            }
            redis_error(command, err)
        })
    }
}

/// Runs the protocol until the socket ends, then announces `End`.
async fn run_socket<F>(driver: F, events: broadcast::Sender<ClientEvent>)
where
    F: Future<Output = ()>,
{
    driver.await;
    let _ = events.send(ClientEvent::End);
}

async fn watch_end(
    mut events: broadcast::Receiver<ClientEvent>,
    closed: Arc<AtomicBool>,
    lifecycle: Arc<Lifecycle>,
) {
    loop {
        match events.recv().await {
            Ok(ClientEvent::End) | Err(RecvError::Closed) => break,
            Ok(ClientEvent::Error(message)) => warn!(%message, "stream socket error"),
            Ok(event) => trace!(?event, "stream socket event"),
            Err(RecvError::Lagged(skipped)) => trace!(skipped, "stream socket events lagged"),
        }
    }
    closed.store(true, Ordering::Release);
    if let Some(cause) = lifecycle.ended() {
        debug!(?cause, "stream socket ended");
    }
}

async fn open_socket(
    options: &ConnectionOptions,
    events: &broadcast::Sender<ClientEvent>,
) -> RedisResult<(MultiplexedConnection, impl Future<Output = ()>)> {
    let socket = TcpStream::connect(options.addr()).await?;
    socket.set_nodelay(true)?;
    let _ = events.send(ClientEvent::Connect);
    let opened = MultiplexedConnection::new(&connection_info(options).redis, socket).await?;
    let _ = events.send(ClientEvent::Ready);
    Ok(opened)
}

#[async_trait]
impl ClientAdapter for StreamAdapter {
    const NAME: &'static str = "stream";

    async fn connect(options: &ConnectionOptions, lifecycle: Arc<Lifecycle>) -> DriverResult<Self> {
        let addr = options.addr();
        let (events, watcher) = broadcast::channel(EVENT_CAPACITY);
        let (conn, driver) = tokio::time::timeout(options.connect_timeout(), open_socket(options, &events))
            .await
            .map_err(|_| DriverError::connect(addr.clone(), "connect timed out"))?
            .map_err(|err| DriverError::connect(addr, err))?;

        let closed = Arc::new(AtomicBool::new(false));
        tokio::spawn(watch_end(watcher, Arc::clone(&closed), lifecycle));
        tokio::spawn(run_socket(driver, events.clone()));
        Ok(StreamAdapter {
            conn,
            events,
            closed,
            response_timeout: options.response_timeout(),
        })
    }

    async fn ping(&self) -> DriverResult<String> {
        self.send("PING", command::ping()).await
    }

    async fn keys_matching(&self, pattern: &str) -> DriverResult<Vec<String>> {
        self.send("KEYS", command::keys(pattern)).await
    }

    async fn exists(&self, keys: &[String]) -> DriverResult<i64> {
        self.send("EXISTS", command::exists(keys)).await
    }

    async fn get(&self, key: &str) -> DriverResult<Option<String>> {
        self.send("GET", command::get(key)).await
    }

    async fn set_plain(&self, key: &str, value: &str) -> DriverResult<String> {
        self.send("SET", command::set(key, value)).await
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl_seconds: u64) -> DriverResult<String> {
        self.send("SETEX", command::setex(key, ttl_seconds, value)).await
    }

    async fn ttl(&self, key: &str) -> DriverResult<i64> {
        self.send("TTL", command::ttl(key)).await
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> DriverResult<i64> {
        self.send("EXPIRE", command::expire(key, ttl_seconds)).await
    }

    async fn delete(&self, keys: &[String]) -> DriverResult<i64> {
        self.send("DEL", command::del(keys)).await
    }

    async fn quit(&self) -> DriverResult<String> {
        // Closed is reached when the watcher sees `End`, after the server hangs up.
        self.send("QUIT", command::quit()).await
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
