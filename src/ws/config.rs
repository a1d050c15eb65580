#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use backoff::backoff::Constant;
use bon::Builder;

const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(45);
const DEFAULT_MESSAGE_EXPIRY: Duration = Duration::from_secs(5 * 60);
const DEFAULT_IDLE_PAUSE: Duration = Duration::from_millis(100);
const DEFAULT_DISCONNECT_PAUSE: Duration = Duration::from_secs(10);
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// Timing configuration for the connection loops.
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// Interval between `ping` messages while connected
    #[builder(default = DEFAULT_KEEPALIVE_INTERVAL)]
    pub keepalive_interval: Duration,
    /// Queued messages older than this are discarded instead of sent
    #[builder(default = DEFAULT_MESSAGE_EXPIRY)]
    pub message_expiry: Duration,
    /// Longest the sender waits on an empty queue before re-checking the session
    #[builder(default = DEFAULT_IDLE_PAUSE)]
    pub idle_pause: Duration,
    /// Pause taken by the listener after it detects a disconnect
    #[builder(default = DEFAULT_DISCONNECT_PAUSE)]
    pub disconnect_pause: Duration,
    /// Reconnection strategy configuration
    #[builder(default)]
    pub reconnect: ReconnectConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Configuration for automatic reconnection behavior.
///
/// Failed attempts are retried forever, each after the same fixed delay.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay between failed connection attempts
    pub delay: Duration,
}

impl ReconnectConfig {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

impl From<ReconnectConfig> for Constant {
    fn from(config: ReconnectConfig) -> Self {
        Constant::new(config.delay)
    }
}
