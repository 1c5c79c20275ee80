//! Channel abstraction over stdio, TCP, and Unix-domain transports (§4.D).
//!
//! Every transport implements [`MessageChannel`] and exposes the same
//! lifecycle: connect, send/receive framed envelopes, ping, and report
//! its [`ChannelState`]. The orchestrator handshake always establishes a
//! stdio channel first; TCP and Unix channels are negotiated afterwards
//! if the init record requests them.

mod stdio;
mod tcp;
mod unix;

pub use stdio::StdioChannel;
pub use tcp::TcpChannel;
pub use unix::UnixChannel;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::NetworkError;
use crate::framing::Envelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Stdio,
    Tcp,
    Unix,
}

/// How a channel reacts to a dropped connection.
#[derive(Debug, Clone)]
pub enum ReconnectPolicy {
    None,
    Fixed { delay: Duration, max_attempts: u32 },
    Exponential { base: Duration, max: Duration, max_attempts: u32 },
}

impl ReconnectPolicy {
    /// The delay to wait before reconnect attempt number `attempt` (1-indexed).
    /// Returns `None` once `max_attempts` has been exceeded.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        match self {
            ReconnectPolicy::None => None,
            ReconnectPolicy::Fixed { delay, max_attempts } => {
                if attempt > *max_attempts {
                    None
                } else {
                    Some(*delay)
                }
            }
            ReconnectPolicy::Exponential { base, max, max_attempts } => {
                if attempt > *max_attempts {
                    None
                } else {
                    let scaled = base.saturating_mul(1 << attempt.min(16));
                    Some(scaled.min(*max))
                }
            }
        }
    }
}

/// Capabilities a channel reports for routing decisions (§4.F consults these).
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelCapabilities {
    pub supports_streaming: bool,
    pub max_message_bytes: Option<usize>,
}

#[async_trait]
pub trait MessageChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    fn state(&self) -> ChannelState;

    async fn connect(&mut self) -> Result<(), NetworkError>;

    async fn disconnect(&mut self) -> Result<(), NetworkError>;

    async fn send(&mut self, envelope: &Envelope) -> Result<(), NetworkError>;

    async fn receive(&mut self) -> Result<Option<Envelope>, NetworkError>;

    async fn ping(&mut self) -> Result<Duration, NetworkError>;

    fn capabilities(&self) -> ChannelCapabilities;
}

/// The set of channels negotiated for this module: always a stdio
/// channel, optionally a TCP and/or Unix channel per the init record.
pub struct ChannelSet {
    pub stdio: StdioChannel,
    pub tcp: Option<TcpChannel>,
    pub unix: Option<UnixChannel>,
}

impl ChannelSet {
    pub fn new(stdio: StdioChannel) -> Self {
        Self { stdio, tcp: None, unix: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_policy_stops_after_max_attempts() {
        let policy = ReconnectPolicy::Fixed { delay: Duration::from_millis(50), max_attempts: 2 };
        assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(50)));
        assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(50)));
        assert_eq!(policy.delay_for_attempt(3), None);
    }

    #[test]
    fn exponential_policy_grows_and_caps() {
        let policy = ReconnectPolicy::Exponential {
            base: Duration::from_millis(10),
            max: Duration::from_millis(100),
            max_attempts: 10,
        };
        assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(20)));
        assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(40)));
        assert_eq!(policy.delay_for_attempt(5), Some(Duration::from_millis(100)));
    }

    #[test]
    fn none_policy_never_reconnects() {
        assert_eq!(ReconnectPolicy::None.delay_for_attempt(1), None);
    }
}
