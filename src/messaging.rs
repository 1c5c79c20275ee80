//! Internal messaging (§4.M): module-to-module routed request/response
//! with a periodic sweeper that times out stale futures.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::warn;
use uuid::Uuid;

use crate::error::{InternalMessagingError, SdkError};
use rt_wire::{RouteToModuleRequest, RouteToModuleResponse, RoutedPayload};
use rt_wire::EncodingFormat;

const SWEEP_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait::async_trait]
pub trait RoutingTransport: Send + Sync {
    async fn emit_route_to_module(&self, request: RouteToModuleRequest) -> Result<(), SdkError>;
}

struct PendingEntry {
    completion: oneshot::Sender<RouteToModuleResponse>,
    deadline: Instant,
}

struct Inner {
    pending: HashMap<String, PendingEntry>,
}

pub struct InternalMessagingClient {
    transport: Arc<dyn RoutingTransport>,
    inner: Arc<Mutex<Inner>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl InternalMessagingClient {
    pub fn new(transport: Arc<dyn RoutingTransport>) -> Arc<Self> {
        let client = Arc::new(Self {
            transport,
            inner: Arc::new(Mutex::new(Inner { pending: HashMap::new() })),
            sweeper: Mutex::new(None),
        });
        client.clone().spawn_sweeper();
        client
    }

    fn spawn_sweeper(self: Arc<Self>) {
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(SWEEP_INTERVAL).await;
                let now = Instant::now();
                let mut guard = inner.lock().await;
                let expired: Vec<String> = guard
                    .pending
                    .iter()
                    .filter(|(_, entry)| entry.deadline <= now)
                    .map(|(id, _)| id.clone())
                    .collect();
                for id in expired {
                    if let Some(entry) = guard.pending.remove(&id) {
                        warn!(request_id = %id, "internal messaging request expired");
                        drop(entry.completion);
                    }
                }
            }
        });
        // spawn happens on a separate task; store handle under a blocking
        // lock here since this runs only once, at construction.
        if let Ok(mut slot) = self.sweeper.try_lock() {
            *slot = Some(handle);
        }
    }

    pub async fn send_request<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        target_module: &str,
        endpoint: &str,
        payload: &Req,
        timeout: Option<Duration>,
    ) -> Result<Resp, InternalMessagingError> {
        let request_id = Uuid::new_v4().to_string();
        let data = serde_json::to_vec(payload).map_err(|e| InternalMessagingError(e.to_string()))?;

        let request = RouteToModuleRequest {
            target_module_id: target_module.to_owned(),
            target_endpoint: endpoint.to_owned(),
            request_id: request_id.clone(),
            payload: RoutedPayload { data_hex: hex_encode(&data), format: EncodingFormat::Json, metadata: Default::default() },
            timeout_seconds: timeout.map(|d| d.as_secs_f64()),
            source_module_id: None,
        };

        let (tx, rx) = oneshot::channel();
        let deadline = Instant::now() + timeout.unwrap_or(DEFAULT_TIMEOUT);
        self.inner.lock().await.pending.insert(request_id.clone(), PendingEntry { completion: tx, deadline });

        self.transport.emit_route_to_module(request).await.map_err(|e| {
            InternalMessagingError(format!("failed to emit route_to_module: {e}"))
        })?;

        let response = tokio::time::timeout(timeout.unwrap_or(DEFAULT_TIMEOUT), rx)
            .await
            .map_err(|_| InternalMessagingError(format!("request '{request_id}' timed out")))?
            .map_err(|_| InternalMessagingError(format!("request '{request_id}' was cancelled")))?;

        if !response.success {
            return Err(InternalMessagingError(response.error.unwrap_or_else(|| "remote error".to_owned())));
        }
        let payload = response.payload.ok_or_else(|| InternalMessagingError("response carried no payload".to_owned()))?;
        let data = hex_decode(&payload.data_hex).map_err(InternalMessagingError)?;
        serde_json::from_slice(&data).map_err(|e| InternalMessagingError(e.to_string()))
    }

    /// Like [`Self::send_request`], but no completion future is kept.
    pub async fn send_notification<Req: Serialize>(
        &self,
        target_module: &str,
        endpoint: &str,
        payload: &Req,
    ) -> Result<(), InternalMessagingError> {
        let data = serde_json::to_vec(payload).map_err(|e| InternalMessagingError(e.to_string()))?;
        let request = RouteToModuleRequest {
            target_module_id: target_module.to_owned(),
            target_endpoint: endpoint.to_owned(),
            request_id: Uuid::new_v4().to_string(),
            payload: RoutedPayload { data_hex: hex_encode(&data), format: EncodingFormat::Json, metadata: Default::default() },
            timeout_seconds: None,
            source_module_id: None,
        };
        self.transport
            .emit_route_to_module(request)
            .await
            .map_err(|e| InternalMessagingError(format!("failed to emit route_to_module: {e}")))
    }

    /// Resolve the matching pending future for an inbound
    /// `routed_module_response`; logs if no future is registered.
    pub async fn handle_response(&self, response: RouteToModuleResponse) {
        let mut inner = self.inner.lock().await;
        match inner.pending.remove(&response.request_id) {
            Some(entry) => {
                let _ = entry.completion.send(response);
            }
            None => warn!(request_id = %response.request_id, "response for unknown internal messaging request"),
        }
    }

    /// Cancel the sweeper, resolve every pending future with a closing
    /// error (by simply dropping the sender, which the awaiter observes
    /// as a cancelled receive), and stop accepting new requests.
    pub async fn close(&self) {
        if let Some(handle) = self.sweeper.lock().await.take() {
            handle.abort();
        }
        let mut inner = self.inner.lock().await;
        for (_, entry) in inner.pending.drain() {
            drop(entry.completion);
        }
    }
}

fn hex_encode(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err("odd-length hex string".to_owned());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| e.to_string()))
        .collect()
}
