//! Connection engine.
//!
//! Three long-running tasks share one session handle and one outbound queue:
//!
//! - **sender**: while disconnected, attempts a connection every
//!   [`ReconnectConfig::delay`](config::ReconnectConfig); while connected, drains the
//!   [`OutboundQueue`], dropping entries older than [`Config::message_expiry`](config::Config).
//! - **listener**: receives frames from the live session, answers `get_config`/`set_config`
//!   itself and hands every other message to the registered [`Handler`]s.
//! - **keepalive**: queues a `ping` every [`Config::keepalive_interval`](config::Config)
//!   while connected.
//!
//! Every new session is preceded by its handshake (`subscribe`, plus `connect` for legacy
//! authentication), inserted at the front of the queue so it is sent before anything the
//! application queued while the link was down.

pub mod config;
pub(crate) mod connection;
pub(crate) mod connector;
pub(crate) mod dispatch;
pub mod error;
pub mod queue;
pub mod session;
pub mod traits;
pub mod transport;

pub use connector::{PROTOCOL, WEBSOCKET_PATH};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use queue::{OutboundQueue, QueuedMessage};
pub use session::ConnectionState;
pub use traits::*;
pub use transport::WebSocketTransport;
