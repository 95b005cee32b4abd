//! # Nitrous Cache Drivers
//!
//! Purpose: Let a cache facade talk to a Redis-like store through any of
//! several client libraries without knowing which one is in use.
//!
//! ## Design Principles
//! 1. **Adapter Pattern**: Each client library sits behind `ClientAdapter`;
//!    `CacheDriver<A>` only depends on that trait.
//! 2. **Lazy Connection**: Nothing touches the network until the first call,
//!    and concurrent first calls share one connection attempt.
//! 3. **Explicit Lifecycle**: Connection state is an atomic state machine fed
//!    by the client's own end notifications, or by the first call that finds
//!    the connection gone when the client has none.
//! 4. **No Hidden Failures**: Errors propagate untouched, except inside the
//!    `is_connected` liveness probe.
//!
//! ## Structure Overview
//!
//! ```text
//! Box<dyn Driver>
//!   └── CacheDriver<A: ClientAdapter>
//!         ├── options: ConnectionOptions
//!         ├── lifecycle: Arc<Lifecycle>
//!         └── client: OnceCell<A>
//!               ├── RedisAdapter     (multiplexed connection, direct flag, driver watch)
//!               ├── BlockingAdapter  (sync redis::Connection on the blocking pool)
//!               └── StreamAdapter    (own socket, ClientEvent::End watcher)
//! ```

mod adapter;
pub mod adapters;
mod driver;
mod kind;
mod lifecycle;

pub use adapter::ClientAdapter;
pub use adapters::{BlockingAdapter, ClientEvent, RedisAdapter, StreamAdapter};
pub use driver::{BlockingDriver, CacheDriver, Driver, RedisDriver, StreamDriver};
pub use kind::DriverKind;
pub use lifecycle::{CloseCause, Lifecycle, LifecycleState};

pub use nitrous_common::{ConnectionOptions, DriverError, DriverResult, Keys};
