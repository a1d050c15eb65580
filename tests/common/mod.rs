#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests, and https://github.com/rust-lang/rust-clippy/issues/13981"
)]
#![allow(
    unused,
    reason = "Not every test binary uses every helper"
)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{SinkExt as _, StreamExt as _};
use rhizo_client_sdk::Result;
use rhizo_client_sdk::config::ConfigStore;
use rhizo_client_sdk::error::{Error, Kind};
use rhizo_client_sdk::types::{Map, Parameters, Value, Version, json};
use rhizo_client_sdk::ws::config::Config;
use rhizo_client_sdk::ws::{ConnectRequest, FrameSink, FrameStream, Transport, WsError};
use tokio::sync::mpsc as tokio_mpsc;
use tokio::time::{Instant, timeout};
use tracing_subscriber::EnvFilter;

pub const SERVER_NAME: &str = "127.0.0.1:5000";
pub const SECRET_KEY: &str = "0123456789abcdef";
pub const VERSION: &str = "0.0.8";
pub const BUILD: &str = "7";

/// How long a test waits for the client to write a frame.
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(600);

pub fn init_tracing() {
    drop(
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init(),
    );
}

#[must_use]
pub fn version() -> Version {
    Version::new(VERSION, BUILD)
}

/// Engine timings used by most tests: defaults, with keepalive pushed out of the way.
#[must_use]
pub fn config() -> Config {
    Config::builder()
        .keepalive_interval(Duration::from_secs(3600))
        .build()
}

/// In-memory store holding the connection settings plus every key in `extra`.
#[must_use]
pub fn store(extra: Value) -> Arc<dyn ConfigStore> {
    let mut values = Map::new();
    values.insert("server_name".to_owned(), json!(SERVER_NAME));
    values.insert("secret_key".to_owned(), json!(SECRET_KEY));
    values.extend(parameters(extra));
    Arc::new(values)
}

#[must_use]
pub fn parameters(value: Value) -> Parameters {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// What the next call to [`FakeTransport::open`] does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Fail the attempt
    Refuse,
    /// Open a working session
    Accept,
    /// Open a session whose outbound half is already closed
    AcceptClosed,
}

/// Transport that follows a script of outcomes and hands every opened session to the test.
/// Attempts past the end of the script are refused.
pub struct FakeTransport {
    script: Mutex<VecDeque<Outcome>>,
    requests: Mutex<Vec<ConnectRequest>>,
    attempted_at: Mutex<Vec<Instant>>,
    sessions: tokio_mpsc::UnboundedSender<FakeSession>,
}

impl FakeTransport {
    pub fn new<I: IntoIterator<Item = Outcome>>(
        script: I,
    ) -> (Arc<Self>, tokio_mpsc::UnboundedReceiver<FakeSession>) {
        let (sessions, rx) = tokio_mpsc::unbounded_channel();
        let transport = Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            attempted_at: Mutex::new(Vec::new()),
            sessions,
        };
        (Arc::new(transport), rx)
    }

    /// Every request seen so far, refused ones included.
    pub fn requests(&self) -> Vec<ConnectRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// When each attempt reached the transport.
    pub fn attempt_times(&self) -> Vec<Instant> {
        self.attempted_at.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn open(&self, request: &ConnectRequest) -> Result<(FrameSink, FrameStream)> {
        self.requests.lock().unwrap().push(request.clone());
        self.attempted_at.lock().unwrap().push(Instant::now());
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Outcome::Refuse);

        if outcome == Outcome::Refuse {
            return Err(WsError::ConnectionClosed.into());
        }

        let (sent_tx, mut sent_rx) = mpsc::unbounded::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded::<Result<String>>();
        if outcome == Outcome::AcceptClosed {
            sent_rx.close();
        }

        let sink: FrameSink =
            Box::pin(sent_tx.sink_map_err(|e| Error::with_source(Kind::WebSocket, e)));
        let stream: FrameStream = Box::pin(inbound_rx);

        drop(self.sessions.send(FakeSession {
            sent: sent_rx,
            inbound: inbound_tx,
        }));
        Ok((sink, stream))
    }
}

/// The server's end of one fake session.
pub struct FakeSession {
    sent: mpsc::UnboundedReceiver<String>,
    inbound: mpsc::UnboundedSender<Result<String>>,
}

impl FakeSession {
    /// Next frame written by the client, parsed.
    pub async fn next_frame(&mut self) -> Value {
        let frame = timeout(FRAME_TIMEOUT, self.sent.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("session closed");
        assert!(frame.ends_with('\n'), "frame not newline terminated: {frame:?}");
        serde_json::from_str(&frame).unwrap()
    }

    /// Frames until the next one whose type is not `ping`.
    pub async fn next_non_ping(&mut self) -> Value {
        loop {
            let frame = self.next_frame().await;
            if frame["type"] != "ping" {
                return frame;
            }
        }
    }

    /// Wait for the client to drop its end of the session.
    pub async fn closed(&mut self) -> bool {
        loop {
            match timeout(FRAME_TIMEOUT, self.sent.next()).await {
                Ok(Some(_)) => {}
                Ok(None) => return true,
                Err(_) => return false,
            }
        }
    }

    /// Deliver a raw frame to the client.
    pub fn push(&self, frame: &str) {
        self.inbound.unbounded_send(Ok(frame.to_owned())).unwrap();
    }

    pub fn push_json(&self, frame: &Value) {
        self.push(&format!("{frame}\n"));
    }

    /// Make the client's next receive fail.
    pub fn fail(&self) {
        self.inbound
            .unbounded_send(Err(WsError::ConnectionClosed.into()))
            .unwrap();
    }
}
