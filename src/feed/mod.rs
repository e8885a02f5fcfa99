//! Connection and broadcast layer.
//!
//! Maintains N independent reconnecting source connections and M client
//! sinks. Inbound source messages are parsed and routed to a registered
//! handler; handler output is queued and fanned out to every sink by a
//! single broadcast worker. Source liveness and client liveness are fully
//! decoupled: a dead venue feed keeps retrying with exponential backoff
//! while clients continue to receive whatever the other sources produce.

mod manager;
mod sink;
mod transport;

pub use manager::{BroadcastItem, FeedManager, SourceHandler, SourceStatus};
pub use sink::{channel_sink, ChannelSink, ClientSink};
pub use transport::{SourceTransport, TransportFactory, WsTransport};

use serde::Deserialize;

/// Observable state of one source connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Reconnecting,
    Error,
}

impl ConnectionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        }
    }
}

/// Reconnection and broadcast configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    /// Initial backoff delay in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff ceiling in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Give up and go terminal after this many failed attempts.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Broadcast queue capacity; items are dropped when full.
    #[serde(default = "default_queue_size")]
    pub broadcast_queue_size: usize,
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_max_attempts() -> u32 {
    10
}

fn default_queue_size() -> usize {
    256
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            broadcast_queue_size: default_queue_size(),
        }
    }
}

impl ReconnectConfig {
    /// Backoff delay for the given 1-based attempt number.
    ///
    /// `min(base * 2^(attempt-1), max)`, saturating on overflow.
    #[must_use]
    pub fn backoff_delay_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1).min(32);
        self.base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let config = ReconnectConfig {
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            ..ReconnectConfig::default()
        };

        assert_eq!(config.backoff_delay_ms(1), 1_000);
        assert_eq!(config.backoff_delay_ms(2), 2_000);
        assert_eq!(config.backoff_delay_ms(3), 4_000);
        assert_eq!(config.backoff_delay_ms(7), 60_000);
        assert_eq!(config.backoff_delay_ms(100), 60_000);
    }

    #[test]
    fn state_names_are_stable() {
        assert_eq!(ConnectionState::Connected.as_str(), "connected");
        assert_eq!(ConnectionState::Reconnecting.as_str(), "reconnecting");
    }
}
