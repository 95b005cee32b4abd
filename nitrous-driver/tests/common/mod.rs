//! In-process stand-in for the remote store.
//!
//! Speaks just enough RESP2 for the driver contract: PING, KEYS, EXISTS, GET,
//! SET [EX], SETEX, TTL, EXPIRE, DEL, QUIT, plus OK replies for the setup
//! commands clients send while connecting. A `Mode` makes it misbehave in the
//! ways a driver has to cope with.

#![allow(dead_code)]

mod resp;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use nitrous_driver::{ConnectionOptions, Driver};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use self::resp::{decode_command, Reply};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Polls `check` for up to one second.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Options pointing at a port nobody listens on.
pub async fn unreachable_options() -> ConnectionOptions {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    ConnectionOptions {
        connect_timeout_ms: 500,
        ..ConnectionOptions::new("127.0.0.1", port)
    }
}

/// Closes the store after a test, mirroring the facade's cleanup.
pub async fn cleanup(driver: &dyn Driver) {
    if !driver.is_closed() {
        let _ = driver.delete(["foo", "bar", "baz"].into()).await;
        let _ = driver.close().await;
    }
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| now < deadline)
    }
}

type Store = Arc<Mutex<HashMap<String, Entry>>>;

/// How the store answers writes and QUIT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    /// SET, SETEX and QUIT answer `+QUEUED` and change nothing.
    Queued,
    /// QUIT drops the socket without replying.
    HangUpOnQuit,
}

/// What the connection does after a command.
enum Outcome {
    Reply(Reply),
    ReplyThenClose(Reply),
    HangUp,
}

pub struct FakeStore {
    port: u16,
    accepted: Arc<AtomicUsize>,
    kick: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl FakeStore {
    pub async fn start() -> Self {
        Self::start_with(Mode::Normal).await
    }

    pub async fn start_with(mode: Mode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let accepted = Arc::new(AtomicUsize::new(0));
        let (kick, _) = broadcast::channel(4);
        let store: Store = Arc::new(Mutex::new(HashMap::new()));

        let counter = Arc::clone(&accepted);
        let kicker = kick.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(stream, Arc::clone(&store), mode, kicker.subscribe()));
            }
        });

        FakeStore {
            port,
            accepted,
            kick,
            task,
        }
    }

    /// Options as a facade would load them from a JSON blob.
    pub fn options(&self) -> ConnectionOptions {
        serde_json::from_value(serde_json::json!({
            "host": "127.0.0.1",
            "port": self.port,
            "connect_timeout_ms": 1000,
            "response_timeout_ms": 2000,
        }))
        .expect("options")
    }

    /// Number of connections accepted so far.
    pub fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Drops every open client socket, as a restarting server would.
    pub fn kick_all(&self) {
        let _ = self.kick.send(());
    }
}

impl Drop for FakeStore {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(mut stream: TcpStream, store: Store, mode: Mode, mut kick: broadcast::Receiver<()>) {
    let mut buffer = BytesMut::with_capacity(4 * 1024);
    let mut out = Vec::with_capacity(256);
    loop {
        tokio::select! {
            _ = kick.recv() => return,
            read = stream.read_buf(&mut buffer) => match read {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            },
        }

        loop {
            let args = match decode_command(&mut buffer) {
                Ok(Some(args)) => args,
                Ok(None) => break,
                Err(_) => return,
            };
            let (reply, close) = match dispatch(&args, &store, mode) {
                Outcome::Reply(reply) => (reply, false),
                Outcome::ReplyThenClose(reply) => (reply, true),
                Outcome::HangUp => return,
            };
            out.clear();
            reply.encode(&mut out);
            if stream.write_all(&out).await.is_err() || close {
                return;
            }
        }
    }
}

fn dispatch(args: &[String], store: &Store, mode: Mode) -> Outcome {
    let Some(command) = args.first() else {
        return Outcome::Reply(Reply::Error("ERR empty command"));
    };
    let command = command.to_ascii_uppercase();
    match (command.as_str(), mode) {
        ("SET" | "SETEX" | "QUIT", Mode::Queued) => return Outcome::Reply(Reply::Status("QUEUED")),
        ("QUIT", Mode::HangUpOnQuit) => return Outcome::HangUp,
        ("QUIT", _) => return Outcome::ReplyThenClose(Reply::Status("OK")),
        _ => {}
    }

    let now = Instant::now();
    let mut map = store.lock().expect("store mutex poisoned");
    map.retain(|_, entry| entry.is_live(now));

    let reply = match (command.as_str(), &args[1..]) {
        ("PING", []) => Reply::Status("PONG"),
        ("PING", [message]) => Reply::Bulk(Some(message.clone())),
        ("CLIENT" | "SELECT" | "AUTH", _) => Reply::Status("OK"),
        ("KEYS", [pattern]) => Reply::Array(
            map.keys()
                .filter(|key| glob_match(pattern.as_bytes(), key.as_bytes()))
                .cloned()
                .collect(),
        ),
        ("EXISTS", keys) if !keys.is_empty() => {
            Reply::Integer(keys.iter().filter(|key| map.contains_key(*key)).count() as i64)
        }
        ("GET", [key]) => Reply::Bulk(map.get(key).map(|entry| entry.value.clone())),
        ("SET", [key, value]) => {
            map.insert(key.clone(), Entry { value: value.clone(), expires_at: None });
            Reply::Status("OK")
        }
        ("SET", [key, value, ex, seconds]) if ex.eq_ignore_ascii_case("EX") => {
            set_with_expiry(&mut map, key, value, seconds, now)
        }
        ("SETEX", [key, seconds, value]) => set_with_expiry(&mut map, key, value, seconds, now),
        ("TTL", [key]) => Reply::Integer(match map.get(key) {
            None => -2,
            Some(Entry { expires_at: None, .. }) => -1,
            Some(Entry { expires_at: Some(deadline), .. }) => {
                let remaining = deadline.saturating_duration_since(now).as_millis() as i64;
                (remaining + 500) / 1000
            }
        }),
        ("EXPIRE", [key, seconds]) => match (map.get_mut(key), seconds.parse::<u64>()) {
            (Some(entry), Ok(seconds)) => {
                entry.expires_at = Some(now + Duration::from_secs(seconds));
                Reply::Integer(1)
            }
            (None, Ok(_)) => Reply::Integer(0),
            (_, Err(_)) => Reply::Error("ERR value is not an integer or out of range"),
        },
        ("DEL", keys) if !keys.is_empty() => {
            Reply::Integer(keys.iter().filter(|key| map.remove(*key).is_some()).count() as i64)
        }
        _ => Reply::Error("ERR unknown command or wrong number of arguments"),
    };
    Outcome::Reply(reply)
}

fn set_with_expiry(
    map: &mut HashMap<String, Entry>,
    key: &str,
    value: &str,
    seconds: &str,
    now: Instant,
) -> Reply {
    match seconds.parse::<u64>() {
        Ok(seconds) if seconds > 0 => {
            map.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at: Some(now + Duration::from_secs(seconds)),
                },
            );
            Reply::Status("OK")
        }
        _ => Reply::Error("ERR invalid expire time in 'set' command"),
    }
}

/// Glob matching for `*` and `?`.
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.first(), text.first()) {
        (None, None) => true,
        (Some(b'*'), _) => {
            glob_match(&pattern[1..], text) || (!text.is_empty() && glob_match(pattern, &text[1..]))
        }
        (Some(b'?'), Some(_)) => glob_match(&pattern[1..], &text[1..]),
        (Some(p), Some(t)) if p == t => glob_match(&pattern[1..], &text[1..]),
        _ => false,
    }
}
