//! Failover engine (§4.G): wraps a channel send with a circuit breaker,
//! retry-with-backoff, and metrics observation. Batching, compression,
//! and pooling are provided as separate composable pieces (§4.G.1/.2)
//! rather than folded into the guard itself, since not every call site
//! needs all three.

pub mod batch;
pub mod breaker;
pub mod compression;
pub mod pool;
pub mod retry;

use std::time::Instant;

use crate::error::SdkError;
use crate::metrics::MetricsTracker;
use breaker::CircuitBreaker;
use retry::RetryConfig;

/// Guard an async operation with circuit-breaker + retry + metrics, per
/// §4.G steps 1–3. `op` is retried according to `retry_config`; every
/// attempt's outcome updates both `breaker` and `metrics`.
pub async fn guarded_send<T, F, Fut>(
    breaker: &CircuitBreaker,
    metrics: &MetricsTracker,
    retry_config: &RetryConfig,
    mut op: F,
) -> Result<T, SdkError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, SdkError>>,
{
    if !breaker.allow_request().await {
        return Err(crate::error::CircuitBreakerError::Open { channel: "unknown".to_owned() }.into());
    }

    let result = retry::retry(retry_config, || {
        let started = Instant::now();
        let fut = op();
        async move {
            let outcome = fut.await;
            match &outcome {
                Ok(_) => {
                    breaker.record_success().await;
                    metrics.record_success(started.elapsed());
                }
                Err(_) => {
                    breaker.record_failure().await;
                    metrics.record_failure();
                }
            }
            outcome
        }
    })
    .await;

    result
}
