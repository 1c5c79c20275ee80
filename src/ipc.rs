//! IPC dispatcher (§4.L): reads framed records from the orchestrator in
//! a loop and routes each to the correct subsystem. A malformed record
//! is logged and skipped — parsing never stops the loop.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::channel::MessageChannel;
use crate::framing::{self, Envelope};
use crate::messaging::InternalMessagingClient;
use crate::port::PortNegotiator;
use crate::secret::SecretClient;
use rt_wire::OrchestratorToModule;

/// Handler for a `routed_module_message`, keyed by the source module id
/// that sent it. Unknown sources are logged and ignored per §4.L.
#[async_trait::async_trait]
pub trait RoutedMessageHandler: Send + Sync {
    async fn handle(&self, request: rt_wire::RouteToModuleRequest) -> rt_wire::RouteToModuleResponse;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Continue,
    Shutdown,
}

pub struct Dispatcher {
    pub secrets: Arc<SecretClient>,
    pub ports: Arc<PortNegotiator>,
    pub messaging: Arc<InternalMessagingClient>,
    pub routed_handlers: Mutex<HashMap<String, Arc<dyn RoutedMessageHandler>>>,
}

impl Dispatcher {
    pub fn new(secrets: Arc<SecretClient>, ports: Arc<PortNegotiator>, messaging: Arc<InternalMessagingClient>) -> Self {
        Self { secrets, ports, messaging, routed_handlers: Mutex::new(HashMap::new()) }
    }

    pub async fn register_handler(&self, source_module_id: impl Into<String>, handler: Arc<dyn RoutedMessageHandler>) {
        self.routed_handlers.lock().await.insert(source_module_id.into(), handler);
    }

    /// Run the dispatch loop until EOF, a `shutdown` record, or an
    /// unrecoverable channel error.
    pub async fn run<C: MessageChannel + ?Sized>(&self, channel: &mut C) -> Result<(), crate::error::SdkError> {
        loop {
            let envelope = match channel.receive().await {
                Ok(Some(envelope)) => envelope,
                Ok(None) => {
                    info!("orchestrator channel reached EOF, shutting down");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };

            match self.dispatch_one(&envelope, channel).await {
                Ok(DispatchOutcome::Continue) => continue,
                Ok(DispatchOutcome::Shutdown) => return Ok(()),
                Err(e) => {
                    warn!(error = %e, "malformed or unhandled IPC record, skipping");
                    continue;
                }
            }
        }
    }

    async fn dispatch_one<C: MessageChannel + ?Sized>(
        &self,
        envelope: &Envelope,
        channel: &mut C,
    ) -> Result<DispatchOutcome, crate::error::SdkError> {
        let record: OrchestratorToModule = framing::decode(envelope)?;

        match record {
            OrchestratorToModule::Secret { secret } => {
                self.secrets.process_secret_message(&secret.name, &secret.value, secret.rotation_id).await;
            }
            OrchestratorToModule::Rotated { rotated } => {
                self.secrets.process_rotation_message(rotated.keys, rotated.rotation_id).await;
            }
            OrchestratorToModule::Heartbeat => {
                let ack = rt_wire::ModuleToOrchestrator::heartbeat_ack();
                let ack_envelope = framing::encode(&ack, envelope.format)?;
                channel.send(&ack_envelope).await?;
            }
            OrchestratorToModule::Shutdown => {
                return Ok(DispatchOutcome::Shutdown);
            }
            OrchestratorToModule::PortResponse { port_response } => {
                self.ports.handle_response(port_response).await;
            }
            OrchestratorToModule::RoutedModuleMessage { routed_module_message } => {
                let source = routed_module_message.source_module_id.clone();
                let handlers = self.routed_handlers.lock().await;
                let handler = source.as_ref().and_then(|s| handlers.get(s)).cloned();
                drop(handlers);

                match (handler, source) {
                    (Some(handler), Some(source_module_id)) => {
                        let request_id = routed_module_message.request_id.clone();
                        let response = handler.handle(routed_module_message).await;
                        let reply = rt_wire::ModuleToOrchestrator::RouteToModule {
                            route_to_module: rt_wire::RouteToModuleRequest {
                                target_module_id: source_module_id,
                                target_endpoint: String::new(),
                                request_id,
                                payload: response.payload.unwrap_or(rt_wire::RoutedPayload {
                                    data_hex: String::new(),
                                    format: rt_wire::EncodingFormat::Json,
                                    metadata: Default::default(),
                                }),
                                timeout_seconds: None,
                                source_module_id: None,
                            },
                        };
                        let reply_envelope = framing::encode(&reply, envelope.format)?;
                        channel.send(&reply_envelope).await?;
                    }
                    (_, source) => {
                        warn!(source = ?source, "routed message for unknown handler, ignoring");
                    }
                }
            }
            OrchestratorToModule::RoutedModuleResponse { routed_module_response } => {
                self.messaging.handle_response(routed_module_response).await;
            }
            OrchestratorToModule::Init { .. } | OrchestratorToModule::HttpRequest { .. } => {
                // `init` only ever arrives once, before the dispatcher starts;
                // HTTP-over-stream proxying is handled by user code that
                // inspects the decoded record directly, not by this loop.
                warn!("unexpected record reached the steady-state dispatcher, ignoring");
            }
        }

        Ok(DispatchOutcome::Continue)
    }
}
