//! Unix-domain socket channel, negotiated when the init record carries
//! an `ipc_channel` block. Same framing and lifecycle as [`super::tcp`],
//! over a `UnixStream` instead.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::UnixStream;

use super::{ChannelCapabilities, ChannelKind, ChannelState, MessageChannel};
use crate::error::NetworkError;
use crate::framing::{self, Envelope};

pub struct UnixChannel {
    socket_path: String,
    stream: Option<UnixStream>,
    state: ChannelState,
}

impl UnixChannel {
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self { socket_path: socket_path.into(), stream: None, state: ChannelState::Disconnected }
    }

    fn stream_mut(&mut self) -> Result<&mut UnixStream, NetworkError> {
        self.stream.as_mut().ok_or(NetworkError::ConnectionClosed)
    }
}

#[async_trait]
impl MessageChannel for UnixChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Unix
    }

    fn state(&self) -> ChannelState {
        self.state
    }

    async fn connect(&mut self) -> Result<(), NetworkError> {
        self.state = ChannelState::Connecting;
        match UnixStream::connect(&self.socket_path).await {
            Ok(stream) => {
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
