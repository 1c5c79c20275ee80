//! Request multiplexer (§4.H.4): correlate a sent envelope with its
//! eventual response via a registry of pending completions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::channel::MessageChannel;
use crate::error::SdkError;
use crate::framing::Envelope;

const CORRELATION_PROPERTY: &str = "request-id";

pub struct RequestMultiplexer {
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<Envelope>>>>,
    request_timeout: Duration,
}

impl RequestMultiplexer {
    pub fn new(request_timeout: Duration) -> Self {
        Self { pending: Arc::new(Mutex::new(HashMap::new())), request_timeout }
    }

    /// Send `envelope` over `channel`, attach a fresh correlation id, and
    /// await the matching response up to the global request deadline.
    pub async fn send_request(
        &self,
        mut envelope: Envelope,
        channel: &mut dyn MessageChannel,
    ) -> Result<Envelope, SdkError> {
        let correlation_id = Uuid::new_v4().to_string();
        envelope.metadata.set(CORRELATION_PROPERTY, correlation_id.clone());

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(correlation_id.clone(), tx);

        if let Err(e) = channel.send(&envelope).await {
            self.pending.lock().await.remove(&correlation_id);
            return Err(e.into());
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => {
                self.pending.lock().await.remove(&correlation_id);
                Err(SdkError::Disconnected)
            }
            Err(_) => {
                self.pending.lock().await.remove(&correlation_id);
                Err(SdkError::Timeout(self.request_timeout))
            }
        }
    }

    /// Complete the pending request that matches `envelope`'s correlation
    /// id, if any is still registered. Unmatched responses are dropped —
    /// the caller should log this at the dispatch layer.
    pub async fn handle_response(&self, envelope: Envelope) -> bool {
        let Some(correlation_id) = envelope.metadata.get(CORRELATION_PROPERTY).map(str::to_owned) else {
            return false;
        };
        if let Some(tx) = self.pending.lock().await.remove(&correlation_id) {
            let _ = tx.send(envelope);
            true
        } else {
            false
        }
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}
