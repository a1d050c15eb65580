//! The shared session handle.
//!
//! The sender task installs sessions; the sender or the listener invalidates them. Every
//! session carries a generation number, and invalidation only succeeds against the
//! generation the caller was using, so a late failure report can never tear down a newer
//! session.

use std::fmt;
use std::sync::Arc;

use futures::{SinkExt as _, StreamExt as _};
use tokio::sync::{Mutex, watch};
use tokio::time::Instant;

use super::traits::{FrameSink, FrameStream};
use crate::Result;

/// Public summary of the connection.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live session
    Disconnected,
    /// A session is open
    Connected {
        /// When the session was established
        since: Instant,
        /// Sequence number of the session, starting at 1
        generation: u64,
    },
}

impl ConnectionState {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

/// One live connection.
pub(crate) struct Session {
    generation: u64,
    since: Instant,
    sink: Mutex<FrameSink>,
    stream: Mutex<FrameStream>,
}

impl Session {
    pub fn new(generation: u64, sink: FrameSink, stream: FrameStream) -> Self {
        Self {
            generation,
            since: Instant::now(),
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Transmit one text frame.
    pub async fn send(&self, text: String) -> Result<()> {
        self.sink.lock().await.send(text).await
    }

    /// Next inbound frame; `None` once the peer is gone.
    pub async fn receive(&self) -> Option<Result<String>> {
        self.stream.lock().await.next().await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("generation", &self.generation)
            .field("since", &self.since)
            .finish_non_exhaustive()
    }
}

/// Explicit connection state shared by the three loops.
#[derive(Debug, Clone, Default)]
pub(crate) enum SessionState {
    #[default]
    Disconnected,
    Connected(Arc<Session>),
}

impl SessionState {
    fn summary(&self) -> ConnectionState {
        match self {
            Self::Disconnected => ConnectionState::Disconnected,
            Self::Connected(session) => ConnectionState::Connected {
                since: session.since,
                generation: session.generation,
            },
        }
    }
}

/// Holder of the current [`SessionState`], observable through watch receivers.
#[derive(Debug)]
pub(crate) struct SessionSlot {
    state_tx: watch::Sender<SessionState>,
    summary_tx: watch::Sender<ConnectionState>,
}

impl SessionSlot {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        let (summary_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            state_tx,
            summary_tx,
        }
    }

    pub fn current(&self) -> Option<Arc<Session>> {
        match &*self.state_tx.borrow() {
            SessionState::Connected(session) => Some(Arc::clone(session)),
            SessionState::Disconnected => None,
        }
    }

    /// Whether the session with `generation` is still the live one.
    pub fn is_current(&self, generation: u64) -> bool {
        matches!(
            &*self.state_tx.borrow(),
            SessionState::Connected(session) if session.generation == generation
        )
    }

    pub fn is_connected(&self) -> bool {
        self.summary_tx.borrow().is_connected()
    }

    pub fn summary(&self) -> ConnectionState {
        *self.summary_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe_summary(&self) -> watch::Receiver<ConnectionState> {
        self.summary_tx.subscribe()
    }

    /// Replace the current state with a new live session.
    pub fn install(&self, session: Arc<Session>) {
        let state = SessionState::Connected(session);
        self.summary_tx.send_replace(state.summary());
        self.state_tx.send_replace(state);
    }

    /// Drop the session with `generation` if it is still current.
    ///
    /// Returns `true` for exactly one caller per session.
    pub fn invalidate(&self, generation: u64) -> bool {
        let invalidated = self.state_tx.send_if_modified(|state| match state {
            SessionState::Connected(session) if session.generation == generation => {
                *state = SessionState::Disconnected;
                true
            }
            _ => false,
        });

        if invalidated {
            self.summary_tx.send_replace(ConnectionState::Disconnected);
        }
        invalidated
    }
}
