//! Shared test harness for the module runtime's integration suite.
//!
//! Provides a mock orchestrator that speaks the real framed wire protocol
//! over an in-memory duplex pipe, plus a [`DuplexChannel`] adapter so a
//! [`module_sdk::ipc::Dispatcher`] can be driven against it the same way
//! it would be driven against real stdio.

use std::time::Duration;

use module_sdk::channel::{ChannelCapabilities, ChannelKind, ChannelState, MessageChannel};
use module_sdk::error::NetworkError;
use module_sdk::framing::{self, Envelope};
use rt_wire::{EncodingFormat, ModuleToOrchestrator, OrchestratorToModule};
use tokio::io::DuplexStream;

const DUPLEX_BUFFER: usize = 64 * 1024;

/// A [`MessageChannel`] backed by one half of an in-memory duplex pipe,
/// used in place of [`module_sdk::channel::StdioChannel`] in tests.
pub struct DuplexChannel {
    stream: DuplexStream,
    state: ChannelState,
}

impl DuplexChannel {
    pub fn new(stream: DuplexStream) -> Self {
        Self { stream, state: ChannelState::Connected }
    }
}

#[async_trait::async_trait]
impl MessageChannel for DuplexChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Stdio
    }

    fn state(&self) -> ChannelState {
        self.state
    }

    async fn connect(&mut self) -> Result<(), NetworkError> {
        self.state = ChannelState::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), NetworkError> {
        self.state = ChannelState::Disconnected;
        Ok(())
    }

    async fn send(&mut self, envelope: &Envelope) -> Result<(), NetworkError> {
        framing::write(envelope, &mut self.stream).await.map_err(|e| {
            self.state = ChannelState::Failed;
            NetworkError::ConnectionError(e.to_string())
        })
    }

    async fn receive(&mut self) -> Result<Option<Envelope>, NetworkError> {
        match framing::read(&mut self.stream).await {
            Ok(envelope) => Ok(envelope),
            Err(e) => {
                self.state = ChannelState::Failed;
                Err(NetworkError::ConnectionError(e.to_string()))
            }
        }
    }

    async fn ping(&mut self) -> Result<Duration, NetworkError> {
        Ok(Duration::ZERO)
    }

    fn capabilities(&self) -> ChannelCapabilities {
        ChannelCapabilities { supports_streaming: false, max_message_bytes: None }
    }
}

/// The orchestrator side of a test pair: sends [`OrchestratorToModule`]
/// records and reads back [`ModuleToOrchestrator`] records over the same
/// framing the module under test uses.
pub struct MockOrchestrator {
    stream: DuplexStream,
}

impl MockOrchestrator {
    /// Build a connected pair: the returned [`DuplexChannel`] is handed to
    /// the module under test, `Self` plays the orchestrator's role.
    pub fn pair() -> (Self, DuplexChannel) {
        let (orchestrator_side, module_side) = tokio::io::duplex(DUPLEX_BUFFER);
        (Self { stream: orchestrator_side }, DuplexChannel::new(module_side))
    }

    pub async fn send(&mut self, record: &OrchestratorToModule) -> Result<(), module_sdk::SdkError> {
        let envelope = framing::encode(record, EncodingFormat::Json)?;
        framing::write(&envelope, &mut self.stream).await?;
        Ok(())
    }

    pub async fn recv(&mut self) -> Result<Option<ModuleToOrchestrator>, module_sdk::SdkError> {
        match framing::read(&mut self.stream).await? {
            Some(envelope) => Ok(Some(framing::decode(&envelope)?)),
            None => Ok(None),
        }
    }

    /// Read records until one matches `predicate`, discarding the rest.
    /// Used by tests that only care about one record among several
    /// (e.g. skipping an `identify` before a `get_secret`).
    pub async fn recv_until(
        &mut self,
        mut predicate: impl FnMut(&ModuleToOrchestrator) -> bool,
    ) -> Result<ModuleToOrchestrator, module_sdk::SdkError> {
        loop {
            match self.recv().await? {
                Some(record) if predicate(&record) => return Ok(record),
                Some(_) => continue,
                None => {
                    return Err(module_sdk::error::BootstrapError(
                        "orchestrator stream closed before matching record arrived".to_owned(),
                    )
                    .into())
                }
            }
        }
    }
}

/// A ready-made `init` record for tests that just need a valid handshake.
pub fn sample_init_json(module_id: &str) -> String {
    format!(
        r#"{{"orchestrator_api":"http://127.0.0.1:9900","module_id":"{module_id}","env":{{}},"listen":"127.0.0.1:0","security_level":"none","debug_mode":false,"log_level":"info"}}"#
    )
}
