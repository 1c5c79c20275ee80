//! TCP channel: a direct socket to the orchestrator's data plane,
//! negotiated when the init record carries a `tcp_channel` block.
//!
//! Connect/reconnect mirrors the uplink session pattern used elsewhere
//! in this workspace: connect, then let the caller drive send/receive;
//! reconnection is the caller's responsibility, driven by the channel's
//! [`super::ReconnectPolicy`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::TcpStream;

use super::{ChannelCapabilities, ChannelKind, ChannelState, MessageChannel};
use crate::error::NetworkError;
use crate::framing::{self, Envelope};

pub struct TcpChannel {
    host: String,
    port: u16,
    stream: Option<TcpStream>,
    state: ChannelState,
}

impl TcpChannel {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port, stream: None, state: ChannelState::Disconnected }
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream, NetworkError> {
        self.stream.as_mut().ok_or(NetworkError::ConnectionClosed)
    }
}

#[async_trait]
impl MessageChannel for TcpChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Tcp
    }

    fn state(&self) -> ChannelState {
        self.state
    }

    async fn connect(&mut self) -> Result<(), NetworkError> {
        self.state = ChannelState::Connecting;
        let addr = format!("{}:{}", self.host, self.port);
        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                stream.set_nodelay(true).map_err(NetworkError::Io)?;
                self.stream = Some(stream);
                self.state = ChannelState::Connected;
                Ok(())
            }
            Err(e) => {
                self.state = ChannelState::Failed;
                Err(NetworkError::ConnectionFailed(e.to_string()))
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), NetworkError> {
        self.stream = None;
        self.state = ChannelState::Disconnected;
        Ok(())
    }

    async fn send(&mut self, envelope: &Envelope) -> Result<(), NetworkError> {
        let stream = self.stream_mut()?;
        if let Err(e) = framing::write(envelope, stream).await {
            self.state = ChannelState::Failed;
            return Err(NetworkError::ConnectionError(e.to_string()));
        }
        Ok(())
    }

    async fn receive(&mut self) -> Result<Option<Envelope>, NetworkError> {
        let stream = self.stream_mut()?;
        match framing::read(stream).await {
            Ok(envelope) => Ok(envelope),
            Err(e) => {
                self.state = ChannelState::Failed;
                Err(NetworkError::ConnectionError(e.to_string()))
            }
        }
    }

    async fn ping(&mut self) -> Result<Duration, NetworkError> {
        let start = Instant::now();
        self.stream_mut()?;
        Ok(start.elapsed())
    }

    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities { supports_streaming: true, max_message_bytes: Some(64 * 1024 * 1024) }
    }
}
