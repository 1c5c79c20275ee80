//! The stdio channel: the orchestrator's primary control-plane transport.
//!
//! Every module speaks this channel from process start — it carries the
//! init/announce handshake and the `OrchestratorToModule`/
//! `ModuleToOrchestrator` dispatch traffic. It cannot reconnect: if stdin
//! or stdout closes, the module is being torn down.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{Stdin, Stdout};

use super::{ChannelCapabilities, ChannelKind, ChannelState, MessageChannel};
use crate::error::NetworkError;
use crate::framing::{self, Envelope};

pub struct StdioChannel {
    stdin: Stdin,
    stdout: Stdout,
    state: ChannelState,
}

impl StdioChannel {
    pub fn new() -> Self {
        Self { stdin: tokio::io::stdin(), stdout: tokio::io::stdout(), state: ChannelState::Connected }
    }
}

impl Default for StdioChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageChannel for StdioChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Stdio
    }

    fn state(&self) -> ChannelState {
        self.state
    }

    async fn connect(&mut self) -> Result<(), NetworkError> {
        // stdio is connected for the lifetime of the process; nothing to do.
        self.state = ChannelState::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), NetworkError> {
        self.state = ChannelState::Disconnected;
        Ok(())
    }

    async fn send(&mut self, envelope: &Envelope) -> Result<(), NetworkError> {
        framing::write(envelope, &mut self.stdout).await.map_err(|e| {
            self.state = ChannelState::Failed;
            NetworkError::ConnectionError(e.to_string())
        })
    }

    async fn receive(&mut self) -> Result<Option<Envelope>, NetworkError> {
        match framing::read(&mut self.stdin).await {
            Ok(envelope) => Ok(envelope),
            Err(e) => {
                self.state = ChannelState::Failed;
                Err(NetworkError::ConnectionError(e.to_string()))
            }
        }
    }

    async fn ping(&mut self) -> Result<Duration, NetworkError> {
        let start = Instant::now();
        Ok(start.elapsed())
    }

    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities { supports_streaming: false, max_message_bytes: None }
    }
}
