#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use backoff::backoff::Constant;

const DEFAULT_RECONNECT_DELAY_DURATION: Duration = Duration::from_secs(5);
/// The server pings every 30 seconds; two extra seconds absorb scheduling jitter.
pub(crate) const HEARTBEAT_WINDOW_DURATION: Duration = Duration::from_secs(32);
pub(crate) const REQUEST_TIMEOUT_DURATION: Duration = Duration::from_secs(30);

/// Configuration for WebSocket client behavior.
///
/// Only reconnection is tunable. The heartbeat window and the request timeout
/// are fixed by the protocol.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct Config {
    /// Reconnection strategy configuration
    pub reconnect: ReconnectConfig,
    pub(crate) heartbeat_window: Duration,
    pub(crate) request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            heartbeat_window: HEARTBEAT_WINDOW_DURATION,
            request_timeout: REQUEST_TIMEOUT_DURATION,
        }
    }
}

impl Config {
    /// Config that never reconnects after a dropped socket.
    #[must_use]
    pub fn without_reconnect() -> Self {
        let mut config = Self::default();
        config.reconnect.enabled = false;
        config
    }

    /// Liveness window after which a silent socket is closed.
    #[must_use]
    pub const fn heartbeat_window(&self) -> Duration {
        self.heartbeat_window
    }

    /// How long a correlated request waits for its response.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

/// Configuration for automatic reconnection behavior.
///
/// Reconnects happen after the same fixed delay every time, with no cap on the
/// number of attempts.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Whether an unexpected close schedules another connection attempt
    pub enabled: bool,
    /// Delay between a close and the next connection attempt
    pub delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay: DEFAULT_RECONNECT_DELAY_DURATION,
        }
    }
}

impl From<&ReconnectConfig> for Constant {
    fn from(config: &ReconnectConfig) -> Self {
        Constant::new(config.delay)
    }
}

#[cfg(test)]
mod tests {
    use backoff::backoff::Backoff as _;

    use super::*;

    #[test]
    fn reconnect_delay_is_constant() {
        let config = ReconnectConfig::default();
        let mut backoff: Constant = (&config).into();

        for _ in 0..10 {
            assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(5)));
        }
    }

    #[test]
    fn custom_delay_is_respected() {
        let config = ReconnectConfig {
            enabled: true,
            delay: Duration::from_millis(50),
        };
        let mut backoff: Constant = (&config).into();

        backoff.reset();
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(50)));
    }

    #[test]
    fn defaults_match_protocol() {
        let config = Config::default();

        assert!(config.reconnect.enabled);
        assert_eq!(config.heartbeat_window(), Duration::from_secs(32));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(!Config::without_reconnect().reconnect.enabled);
    }
}
