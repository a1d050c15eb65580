use std::sync::{Arc, PoisonError, RwLock};

use backoff::backoff::{Backoff as _, Constant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::config::Config;
use super::connector::Connector;
use super::dispatch::Dispatcher;
use super::queue::OutboundQueue;
use super::session::{Session, SessionSlot, SessionState};
use super::traits::{ErrorReporter, LogReporter};
use crate::Result;
use crate::config::ConfigStore;
use crate::control::{Control, apply_set_config, config_response};
use crate::error::Error;
use crate::message::{Inbound, Message, decode};
use crate::types::Parameters;

/// State shared by the sender, listener and keepalive tasks.
///
/// The tasks communicate only through the session slot and the outbound queue:
/// - the sender owns connecting and is the only task that installs sessions;
/// - the sender or the listener invalidates a session when its I/O fails;
/// - the queue is appended to by anyone and drained only by the sender.
pub(crate) struct ConnectionManager {
    config: Config,
    store: Arc<dyn ConfigStore>,
    connector: Connector,
    pub(crate) queue: OutboundQueue,
    pub(crate) session: SessionSlot,
    pub(crate) dispatcher: Dispatcher,
    reporter: RwLock<Arc<dyn ErrorReporter>>,
}

impl ConnectionManager {
    pub fn new(config: Config, store: Arc<dyn ConfigStore>, connector: Connector) -> Self {
        Self {
            config,
            store,
            connector,
            queue: OutboundQueue::new(),
            session: SessionSlot::new(),
            dispatcher: Dispatcher::default(),
            reporter: RwLock::new(Arc::new(LogReporter)),
        }
    }

    /// Start the three loops. They run until `token` is cancelled.
    pub fn spawn(self: &Arc<Self>, token: &CancellationToken) {
        let this = Arc::clone(self);
        let cancelled = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancelled.cancelled() => {}
                () = this.sender_loop() => {}
            }
        });

        let this = Arc::clone(self);
        let cancelled = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancelled.cancelled() => {}
                () = this.listener_loop() => {}
            }
        });

        let this = Arc::clone(self);
        let cancelled = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancelled.cancelled() => {}
                () = this.keepalive_loop() => {}
            }
        });
    }

    pub fn set_reporter(&self, reporter: Arc<dyn ErrorReporter>) {
        *self.reporter.write().unwrap_or_else(PoisonError::into_inner) = reporter;
    }

    fn report(&self, context: &str, error: &Error) {
        let reporter = Arc::clone(&self.reporter.read().unwrap_or_else(PoisonError::into_inner));
        reporter.report(context, error);
    }

    /// Connects while disconnected, drains the queue while connected.
    async fn sender_loop(&self) {
        let mut backoff: Constant = self.config.reconnect.clone().into();
        let mut was_connected = false;

        loop {
            if let Some(session) = self.session.current() {
                was_connected = true;
                self.drain(&session).await;

                tokio::select! {
                    () = self.queue.enqueued() => {}
                    () = sleep(self.config.idle_pause) => {}
                }
                continue;
            }

            // A session just ended: wait out the reconnect delay before the next attempt,
            // so a server that accepts and then drops the socket is not hammered.
            if was_connected {
                was_connected = false;
                if let Some(delay) = backoff.next_backoff() {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(?delay, "session ended; waiting before reconnecting");
                    sleep(delay).await;
                }
            }

            match self.connector.connect().await {
                Some((session, handshake)) => {
                    backoff.reset();
                    self.session.install(session);

                    // Prepended in reverse so they leave in handshake order, ahead of
                    // anything queued while disconnected.
                    for message in handshake.into_iter().rev() {
                        self.queue.enqueue(message, true);
                    }

                    #[cfg(feature = "tracing")]
                    tracing::info!("controller connected/re-connected");
                }
                None => {
                    if let Some(delay) = backoff.next_backoff() {
                        sleep(delay).await;
                    }
                }
            }
        }
    }

    /// Transmit queued messages until the queue is empty or `session` is gone.
    async fn drain(&self, session: &Session) {
        while self.session.is_current(session.generation()) {
            // Popped before sending: a message whose send fails is not retried.
            let Some(entry) = self.queue.pop_front() else {
                break;
            };

            if entry.enqueued_at.elapsed() > self.config.message_expiry {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    message_type = %entry.message.message_type,
                    "discarding stale message"
                );
                continue;
            }

            let text = match entry.message.encode() {
                Ok(text) => text,
                Err(e) => {
                    self.report("error encoding outbound message", &e);
                    continue;
                }
            };

            #[cfg(feature = "tracing")]
            tracing::trace!(%text, "sending websocket frame");

            if let Err(e) = session.send(text).await {
                #[cfg(feature = "tracing")]
                tracing::debug!(error = %e, "disconnected (on send); reconnecting...");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;

                self.session.invalidate(session.generation());
                break;
            }
        }
    }

    /// Receives frames from the current session and processes them.
    async fn listener_loop(&self) {
        let mut state_rx = self.session.subscribe();

        loop {
            let state = state_rx.borrow_and_update().clone();
            let SessionState::Connected(session) = state else {
                if state_rx.changed().await.is_err() {
                    return;
                }
                continue;
            };

            // A session replaced or dropped elsewhere releases the pending receive.
            let frame = tokio::select! {
                frame = session.receive() => frame,
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    continue;
                }
            };

            match frame {
                Some(Ok(text)) => {
                    if let Err(e) = self.process_frame(&text).await {
                        self.report("error in web socket message listener/handler", &e);
                    }
                }
                disconnected => {
                    #[cfg(feature = "tracing")]
                    {
                        if let Some(Err(e)) = &disconnected {
                            tracing::debug!(error = %e, "receive failed");
                        }
                        tracing::warn!("disconnected (on received); reconnecting...");
                    }
                    #[cfg(not(feature = "tracing"))]
                    let _ = &disconnected;

                    self.session.invalidate(session.generation());
                    drop(session);
                    sleep(self.config.disconnect_pause).await;
                }
            }
        }
    }

    /// Answer control messages; forward everything else to the handlers.
    async fn process_frame(&self, text: &str) -> Result<()> {
        #[cfg(feature = "tracing")]
        tracing::trace!(%text, "received websocket frame");

        let Inbound::Message(message) = decode(text)? else {
            #[cfg(feature = "tracing")]
            tracing::debug!("ignoring frame without type and parameters");
            return Ok(());
        };

        match Control::parse(&message.message_type) {
            Some(Control::GetConfig) => {
                let response = config_response(self.store.as_ref(), &message)?;
                self.queue.enqueue(response, false);
            }
            Some(Control::SetConfig) => {
                apply_set_config(self.store.as_ref(), &message.parameters).await?;
            }
            None => self
                .dispatcher
                .dispatch(&message.message_type, &message.parameters)?,
        }
        Ok(())
    }

    /// Queue a `ping` whenever a session is live, to keep idle connections open.
    async fn keepalive_loop(&self) {
        loop {
            sleep(self.config.keepalive_interval).await;
            if self.session.is_connected() {
                self.queue.enqueue(Message::new("ping", Parameters::new()), false);
            }
        }
    }
}
