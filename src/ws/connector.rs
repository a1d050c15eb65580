use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Value, json};
use url::Url;

use super::session::Session;
use super::traits::{ConnectRequest, Transport};
use crate::Result;
use crate::auth::{basic_authorization, build_auth_code};
use crate::config::{ConfigStore, Settings};
use crate::message::Message;
use crate::types::{Version, object};

/// Path of the message server's websocket endpoint.
pub const WEBSOCKET_PATH: &str = "/api/v1/websocket";

/// Websocket sub-protocol requested on every connection.
pub const PROTOCOL: &str = "http-only";

/// Performs single connection attempts.
pub(crate) struct Connector {
    store: Arc<dyn ConfigStore>,
    version: Version,
    transport: Arc<dyn Transport>,
    generations: AtomicU64,
}

impl Connector {
    pub fn new(store: Arc<dyn ConfigStore>, version: Version, transport: Arc<dyn Transport>) -> Self {
        Self {
            store,
            version,
            transport,
            generations: AtomicU64::new(0),
        }
    }

    /// One connection attempt.
    ///
    /// Returns the new session and its handshake messages in transmit order, or `None` if
    /// the attempt failed for any reason. Failures are logged, never raised.
    pub async fn connect(&self) -> Option<(Arc<Session>, Vec<Message>)> {
        match self.try_connect().await {
            Ok(connected) => Some(connected),
            Err(e) => {
                #[cfg(feature = "tracing")]
                {
                    tracing::debug!(error = %e, "connection attempt failed");
                    tracing::warn!("error connecting to websocket server");
                }
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
                None
            }
        }
    }

    async fn try_connect(&self) -> Result<(Arc<Session>, Vec<Message>)> {
        // Settings are re-read each attempt so a reloaded config takes effect on reconnect.
        let settings = Settings::from_store(self.store.as_ref())?;
        let request = connect_request(&settings, &self.version)?;

        let (sink, stream) = self.transport.open(&request).await?;

        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let session = Arc::new(Session::new(generation, sink, stream));

        Ok((session, handshake(&settings, &self.version)))
    }
}

/// Build the endpoint and headers for `settings`.
pub(crate) fn connect_request(settings: &Settings, version: &Version) -> Result<ConnectRequest> {
    let scheme = if settings.is_secure() { "wss" } else { "ws" };
    let url = Url::parse(&format!(
        "{scheme}://{}{WEBSOCKET_PATH}",
        settings.server_name
    ))?;

    // Legacy auth opens the socket bare and authenticates with a `connect` message instead.
    let authorization =
        (!settings.old_auth).then(|| basic_authorization(version, &settings.secret_key));

    Ok(ConnectRequest {
        url,
        authorization,
        protocol: PROTOCOL,
    })
}

/// Messages that must precede all other traffic on a fresh session, in transmit order:
/// `subscribe`, then `connect` when legacy auth is configured.
pub(crate) fn handshake(settings: &Settings, version: &Version) -> Vec<Message> {
    let mut messages = vec![Message::new(
        "subscribe",
        object(json!({
            "subscriptions": [{
                "folder": "self",
                "include_children": settings.subscribe_children,
            }],
        })),
    )];

    if settings.old_auth {
        let mut parameters = object(json!({
            "authCode": build_auth_code(&settings.secret_key),
            "version": version.to_string(),
        }));
        if let Some(name) = &settings.name {
            parameters.insert("name".to_owned(), Value::String(name.clone()));
        }
        messages.push(Message::new("connect", parameters));
    }

    messages
}
