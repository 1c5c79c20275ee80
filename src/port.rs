//! Port negotiation (§4.E): request a listen port from the orchestrator,
//! correlating responses via request id, guarded by a circuit breaker
//! with deterministic fallback selection.

use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{oneshot, Mutex};
use uuid::Uuid;

use crate::error::{NetworkError, SdkError};
use crate::failover::breaker::{BreakerConfig, CircuitBreaker};
use rt_wire::PortResponse;

const DEFAULT_DEADLINE: Duration = Duration::from_secs(3);
const MAX_RETRIES: u32 = 5;
const FALLBACK_REROLL_ATTEMPTS: u32 = 10;

#[async_trait::async_trait]
pub trait PortTransport: Send + Sync {
    async fn emit_port_request(&self, request_id: &str, preferred: Option<u16>) -> Result<(), SdkError>;
}

pub struct PortNegotiator {
    transport: Arc<dyn PortTransport>,
    breaker: CircuitBreaker,
    pending: Mutex<HashMap<String, oneshot::Sender<PortResponse>>>,
    fallback_range: (u16, u16),
    deadline: Duration,
}

impl PortNegotiator {
    pub fn new(transport: Arc<dyn PortTransport>, fallback_range: (u16, u16)) -> Self {
        Self {
            transport,
            breaker: CircuitBreaker::new(BreakerConfig {
                failure_threshold: 5,
                success_threshold: 1,
                timeout: Duration::from_secs(60),
                minimum_requests: 5,
                ..BreakerConfig::default()
            }),
            pending: Mutex::new(HashMap::new()),
            fallback_range,
            deadline: DEFAULT_DEADLINE,
        }
    }

    /// Negotiate a listen port. If the init record already carried a
    /// pre-allocated port, callers should short-circuit before calling
    /// this at all (step 1 of §4.E is handled by the bootstrap caller).
    pub async fn negotiate(&self, preferred: Option<u16>) -> Result<u16, SdkError> {
        if !self.breaker.allow_request().await {
            return Ok(self.fallback_port());
        }

        for attempt in 1..=MAX_RETRIES {
            let request_id = Uuid::new_v4().to_string();
            let (tx, rx) = oneshot::channel();
            self.pending.lock().await.insert(request_id.clone(), tx);

            if let Err(e) = self.transport.emit_port_request(&request_id, preferred).await {
                self.pending.lock().await.remove(&request_id);
                self.breaker.record_failure().await;
                return Err(e);
            }

            let response = tokio::time::timeout(self.deadline, rx).await;
            self.pending.lock().await.remove(&request_id);

            match response {
                Ok(Ok(resp)) if resp.success => {
                    self.breaker.record_success().await;
                    return Ok(resp.port);
                }
                _ => {
                    self.breaker.record_failure().await;
                    if attempt < MAX_RETRIES {
                        let backoff = Duration::from_secs(2u64.saturating_pow(attempt));
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        Ok(self.fallback_port())
    }

    /// Resolve a `port_response` record from the IPC dispatcher.
    pub async fn handle_response(&self, response: PortResponse) {
        if let Some(tx) = self.pending.lock().await.remove(&response.request_id) {
            let _ = tx.send(response);
        }
    }

    fn fallback_port(&self) -> u16 {
        let mut rng = rand::thread_rng();
        for _ in 0..FALLBACK_REROLL_ATTEMPTS {
            let candidate = rng.gen_range(self.fallback_range.0..=self.fallback_range.1);
            if is_bindable(candidate) {
                return candidate;
            }
        }
        self.fallback_range.0
    }
}

fn is_bindable(port: u16) -> bool {
    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    TcpListener::bind(addr).is_ok()
}

pub fn bind_error(port: u16) -> NetworkError {
    NetworkError::InvalidConfig(format!("port {port} is not bindable on loopback"))
}
