//! Core traits at the seams of the connection engine.

use std::error::Error as StdError;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Sink, Stream};
use secrecy::SecretString;
use url::Url;

use crate::Result;
use crate::error::Error;
use crate::types::Parameters;

/// Outbound half of an open session. Each item is one text frame.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = Error> + Send>>;

/// Inbound half of an open session. The stream ending, or yielding an error, means the
/// session is gone.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Everything needed to open one session.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// `ws://` or `wss://` endpoint
    pub url: Url,
    /// Value for the `Authorization` header, when sent at handshake time
    pub authorization: Option<SecretString>,
    /// Requested websocket sub-protocol
    pub protocol: &'static str,
}

/// Opens sessions to the message server.
///
/// Implemented by [`crate::ws::WebSocketTransport`] for real connections; tests substitute an
/// in-memory transport.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(&self, request: &ConnectRequest) -> Result<(FrameSink, FrameStream)>;
}

/// Error type handlers may return.
pub type HandlerError = Box<dyn StdError + Send + Sync + 'static>;

/// Result returned by [`Handler::handle`].
pub type HandlerResult = std::result::Result<(), HandlerError>;

/// Receives every inbound message that is not a built-in control message.
///
/// Handlers run on the listener task, in registration order. A slow handler delays every
/// handler after it and every later frame.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, message_type: &str, parameters: &Parameters) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&str, &Parameters) -> HandlerResult + Send + Sync + 'static,
{
    fn handle(&self, message_type: &str, parameters: &Parameters) -> HandlerResult {
        self(message_type, parameters)
    }
}

/// Supervisory sink for errors the listener recovers from.
pub trait ErrorReporter: Send + Sync + 'static {
    fn report(&self, context: &str, error: &Error);
}

/// Default reporter: logs the error and its source chain.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, context: &str, error: &Error) {
        #[cfg(feature = "tracing")]
        {
            tracing::error!(kind = ?error.kind(), "{context}: {error}");
            let mut source = StdError::source(error);
            while let Some(cause) = source {
                tracing::info!("caused by: {cause}");
                source = cause.source();
            }
        }
        #[cfg(not(feature = "tracing"))]
        let _ = (context, error);
    }
}
