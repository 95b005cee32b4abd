//! # Connection Lifecycle
//!
//! Purpose: Track one connection from lazy creation to its terminal state and
//! record whether the user or the peer ended it.
//!
//! ```text
//! Uninitialized ──> Connecting ──> Connected ──> Closing ──> Closed(User)
//!       ^               │              │
//!       └── failed ─────┘              └──────────────────> Closed(Peer)
//! ```
//!
//! Every transition is a single compare-and-swap on one `AtomicU8`, so state
//! and close cause can never disagree. End notifications are idempotent: only
//! the first one that reaches `Closed` is reported.
//!
//! Adapters feed it in three ways. `ended` is for libraries that only signal
//! closure through an event. `disconnected` is for end signals from libraries
//! that confirm quit themselves. `lost` is for a call that failed because the
//! connection is gone.

use std::sync::atomic::{AtomicU8, Ordering};

use tracing::{debug, warn};

const UNINITIALIZED: u8 = 0;
const CONNECTING: u8 = 1;
const CONNECTED: u8 = 2;
const CLOSING: u8 = 3;
const CLOSED_BY_USER: u8 = 4;
const CLOSED_BY_PEER: u8 = 5;

/// Who ended the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCause {
    /// `close()` was requested and confirmed.
    User,
    /// The peer or the network ended the connection unprompted.
    Peer,
}

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Uninitialized,
    Connecting,
    Connected,
    Closing,
    Closed(CloseCause),
}

impl LifecycleState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            CONNECTING => LifecycleState::Connecting,
            CONNECTED => LifecycleState::Connected,
            CLOSING => LifecycleState::Closing,
            CLOSED_BY_USER => LifecycleState::Closed(CloseCause::User),
            CLOSED_BY_PEER => LifecycleState::Closed(CloseCause::Peer),
            _ => LifecycleState::Uninitialized,
        }
    }
}

/// Lock-free connection state machine shared by a driver and its adapter.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Lifecycle {
            state: AtomicU8::new(UNINITIALIZED),
        }
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// True once the terminal state has been reached.
    pub fn is_closed(&self) -> bool {
        matches!(self.state(), LifecycleState::Closed(_))
    }

    /// Returns the close cause once closed.
    pub fn close_cause(&self) -> Option<CloseCause> {
        match self.state() {
            LifecycleState::Closed(cause) => Some(cause),
            _ => None,
        }
    }

    /// `Uninitialized -> Connecting`. Returns false if already past it.
    pub fn begin_connect(&self) -> bool {
        let moved = self.transition(UNINITIALIZED, CONNECTING);
        if moved {
            debug!("connection lifecycle: connecting");
        }
        moved
    }

    /// `Connecting -> Connected`.
    pub fn connected(&self) -> bool {
        let moved = self.transition(CONNECTING, CONNECTED);
        if moved {
            debug!("connection lifecycle: connected");
        }
        moved
    }

    /// `Connecting -> Uninitialized`, so a later call may connect again.
    pub fn connect_failed(&self) -> bool {
        let moved = self.transition(CONNECTING, UNINITIALIZED);
        if moved {
            debug!("connection lifecycle: connect failed");
        }
        moved
    }

    /// `Connected -> Closing`. Returns false when no open connection exists.
    pub fn begin_close(&self) -> bool {
        let moved = self.transition(CONNECTED, CLOSING);
        if moved {
            debug!("connection lifecycle: closing");
        }
        moved
    }

    /// `Closing -> Connected` after a quit that did not go through.
    pub fn abort_close(&self) -> bool {
        let moved = self.transition(CLOSING, CONNECTED);
        if moved {
            debug!("connection lifecycle: close aborted");
        }
        moved
    }

    /// `Closing -> Closed(User)` when the library confirms quit synchronously.
    pub fn close_confirmed(&self) -> bool {
        let moved = self.transition(CLOSING, CLOSED_BY_USER);
        if moved {
            debug!("connection lifecycle: closed by user");
        }
        moved
    }

    /// Handles a "connection ended" notification.
    ///
    /// While closing this completes the user path; otherwise the peer ended
    /// the connection. Returns the cause only for the notification that
    /// actually reached `Closed`; repeats return `None`.
    pub fn ended(&self) -> Option<CloseCause> {
        self.settle(|current| match current {
            CLOSING => Some(CloseCause::User),
            CONNECTING | CONNECTED => Some(CloseCause::Peer),
            _ => None,
        })
    }

    /// Handles an end signal from a library that also confirms quit itself.
    ///
    /// Outside a close this is a peer close. While closing it does nothing:
    /// the pending quit settles the outcome.
    pub fn disconnected(&self) -> Option<CloseCause> {
        self.settle(|current| match current {
            CONNECTING | CONNECTED => Some(CloseCause::Peer),
            _ => None,
        })
    }

    /// Handles a call that failed because the connection went away.
    ///
    /// Always a peer close, even during `Closing`: the store never confirmed.
    pub fn lost(&self) -> Option<CloseCause> {
        self.settle(|current| match current {
            CONNECTING | CONNECTED | CLOSING => Some(CloseCause::Peer),
            _ => None,
        })
    }

    fn settle(&self, resolve: impl Fn(u8) -> Option<CloseCause>) -> Option<CloseCause> {
        loop {
            let current = self.state.load(Ordering::Acquire);
            let cause = resolve(current)?;
            let next = match cause {
                CloseCause::User => CLOSED_BY_USER,
                CloseCause::Peer => CLOSED_BY_PEER,
            };
            if self.transition(current, next) {
                match cause {
                    CloseCause::User => debug!("connection lifecycle: closed by user"),
                    CloseCause::Peer => warn!("connection lifecycle: closed by peer"),
                }
                return Some(cause);
            }
        }
    }

    fn transition(&self, from: u8, to: u8) -> bool {
        self.state
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
