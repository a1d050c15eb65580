use std::sync::Arc;

use serde_json::json;
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::config::ConfigStore;
use crate::message::Message;
use crate::types::{Parameters, Version, object};
use crate::ws::config::Config;
use crate::ws::connection::ConnectionManager;
use crate::ws::connector::Connector;
use crate::ws::{ConnectionState, ErrorReporter, Handler, Transport, WebSocketTransport};

/// Client for the message server.
///
/// Creating a client starts the sender, listener and keepalive tasks on the current tokio
/// runtime. They keep one connection open, reconnecting after failures, until the last
/// clone of the client is dropped.
///
/// Sending never blocks and never fails: messages are queued and delivered best-effort once
/// a connection is available.
///
/// # Examples
///
/// ```rust, no_run
/// use std::sync::Arc;
///
/// use rhizo_client_sdk::Client;
/// use rhizo_client_sdk::config::FileConfig;
/// use rhizo_client_sdk::types::{Parameters, Version, json};
/// use rhizo_client_sdk::ws::HandlerResult;
/// use rhizo_client_sdk::ws::config::Config;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let store = Arc::new(FileConfig::load("config.txt")?);
///     let client = Client::new(store, Version::new("0.0.8", "1"), Config::default());
///
///     client.add_handler(|message_type: &str, parameters: &Parameters| -> HandlerResult {
///         println!("{message_type}: {parameters:?}");
///         Ok(())
///     });
///
///     let mut parameters = Parameters::new();
///     parameters.insert("temperature".to_owned(), json!(21.5));
///     client.send("update", parameters);
///
///     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    connection: Arc<ConnectionManager>,
    /// Stops the background tasks when the last client handle goes away
    _shutdown: DropGuard,
}

impl Client {
    /// Create a client that connects over [`WebSocketTransport`].
    ///
    /// # Panics
    ///
    /// Panics if called outside the context of a tokio runtime.
    #[must_use]
    pub fn new(store: Arc<dyn ConfigStore>, version: Version, config: Config) -> Self {
        Self::with_transport(store, version, config, Arc::new(WebSocketTransport))
    }

    /// Create a client that opens sessions through `transport`.
    ///
    /// # Panics
    ///
    /// Panics if called outside the context of a tokio runtime, since the background
    /// tasks are spawned onto it.
    #[must_use]
    pub fn with_transport(
        store: Arc<dyn ConfigStore>,
        version: Version,
        config: Config,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let connector = Connector::new(Arc::clone(&store), version, transport);
        let connection = Arc::new(ConnectionManager::new(config, store, connector));

        let token = CancellationToken::new();
        connection.spawn(&token);

        Self {
            inner: Arc::new(ClientInner {
                connection,
                _shutdown: token.drop_guard(),
            }),
        }
    }

    /// Queue a message with the given type and parameters.
    pub fn send(&self, message_type: &str, parameters: Parameters) {
        self.send_message(Message::new(message_type, parameters), false);
    }

    /// Queue `message`, at the front of the queue when `prepend` is set.
    ///
    /// Consecutive prepends are sent in reverse order of the calls.
    pub fn send_message(&self, message: Message, prepend: bool) {
        self.inner.connection.queue.enqueue(message, prepend);
    }

    /// Ask the server to email `email_addresses` (up to five).
    pub fn send_email(&self, email_addresses: &[String], subject: &str, body: &str) {
        self.send(
            "send_email",
            object(json!({
                "emailAddresses": email_addresses,
                "subject": subject,
                "body": body,
            })),
        );
    }

    /// Ask the server to text `phone_numbers` (up to five).
    pub fn send_sms(&self, phone_numbers: &[String], message: &str) {
        self.send(
            "send_text_message",
            object(json!({
                "phoneNumbers": phone_numbers,
                "message": message,
            })),
        );
    }

    /// Register a handler for inbound messages. Handlers are called in registration order
    /// and stay registered for the life of the client.
    pub fn add_handler<H: Handler>(&self, handler: H) {
        self.inner.connection.dispatcher.add(Arc::new(handler));
    }

    /// Replace the reporter that receives errors the listener recovers from.
    pub fn set_error_reporter<R: ErrorReporter>(&self, reporter: R) {
        self.inner.connection.set_reporter(Arc::new(reporter));
    }

    /// Returns `true` while a session is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connection.session.is_connected()
    }

    /// Get the current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connection.session.summary()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.session.subscribe_summary()
    }

    /// Number of messages waiting to be sent.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.inner.connection.queue.len()
    }
}
