//! Concrete `ClientAdapter` bindings, one per `redis` connection flavour.
//!
//! All three speak through the `redis` crate; they differ in how calls are
//! driven and how the end of a connection is observed.

mod blocking;
mod multiplexed;
mod stream;

pub use self::blocking::BlockingAdapter;
pub use self::multiplexed::RedisAdapter;
pub use self::stream::{ClientEvent, StreamAdapter};

use redis::{ConnectionAddr, ConnectionInfo, ErrorKind, RedisConnectionInfo, RedisError};

use nitrous_common::{ConnectionOptions, DriverError};

fn connection_info(options: &ConnectionOptions) -> ConnectionInfo {
    ConnectionInfo {
        addr: ConnectionAddr::Tcp(options.host.clone(), options.port),
        redis: RedisConnectionInfo {
            db: options.database,
            username: options.username.clone(),
            password: options.password.clone(),
            ..Default::default()
        },
    }
}

/// True when the failure means the connection itself is gone.
fn is_disconnect(err: &RedisError) -> bool {
    err.is_connection_dropped() || err.is_io_error()
}

/// Maps a `redis` failure onto the driver taxonomy.
fn redis_error(command: &'static str, err: RedisError) -> DriverError {
    if is_disconnect(&err) {
        DriverError::ConnectionClosed
    } else if err.kind() == ErrorKind::TypeError {
        DriverError::UnexpectedReply {
            command,
            reply: err.to_string(),
        }
    } else {
        DriverError::remote(command, err)
    }
}

/// Command builders shared by every adapter.
mod command {
    use redis::Cmd;

    pub fn ping() -> Cmd {
        redis::cmd("PING")
    }

    pub fn keys(pattern: &str) -> Cmd {
        let mut cmd = redis::cmd("KEYS");
        cmd.arg(pattern);
        cmd
    }

    pub fn exists(keys: &[String]) -> Cmd {
        let mut cmd = redis::cmd("EXISTS");
        cmd.arg(keys);
        cmd
    }

    pub fn get(key: &str) -> Cmd {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        cmd
    }

    pub fn set(key: &str, value: &str) -> Cmd {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        cmd
    }

    /// `SET key value EX seconds`.
    pub fn set_ex(key: &str, value: &str, seconds: u64) -> Cmd {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("EX").arg(seconds);
        cmd
    }

    /// `SETEX key seconds value`.
    pub fn setex(key: &str, seconds: u64, value: &str) -> Cmd {
        let mut cmd = redis::cmd("SETEX");
        cmd.arg(key).arg(seconds).arg(value);
        cmd
    }

    pub fn ttl(key: &str) -> Cmd {
        let mut cmd = redis::cmd("TTL");
        cmd.arg(key);
        cmd
    }

    pub fn expire(key: &str, seconds: u64) -> Cmd {
        let mut cmd = redis::cmd("EXPIRE");
        cmd.arg(key).arg(seconds);
        cmd
    }

    pub fn del(keys: &[String]) -> Cmd {
        let mut cmd = redis::cmd("DEL");
        cmd.arg(keys);
        cmd
    }

    pub fn quit() -> Cmd {
        redis::cmd("QUIT")
    }
}
