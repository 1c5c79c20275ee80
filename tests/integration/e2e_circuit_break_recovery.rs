// Scenario 5: a channel that fails repeatedly trips its breaker, stays
// open for the cooldown, then recovers through guarded_send once the
// underlying operation starts succeeding again.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use module_sdk::error::SdkError;
use module_sdk::failover::breaker::{BreakerConfig, BreakerState, CircuitBreaker};
use module_sdk::failover::guarded_send;
use module_sdk::failover::retry::RetryConfig;
use module_sdk::metrics::MetricsTracker;

#[tokio::test]
async fn breaker_opens_cools_down_and_recovers() {
    let breaker = CircuitBreaker::new(BreakerConfig {
        failure_threshold: 3,
        minimum_requests: 3,
        timeout: Duration::from_millis(50),
        success_threshold: 1,
        ..BreakerConfig::default()
    });
    let metrics = MetricsTracker::new();
    let retry_config = RetryConfig { max_attempts: 1, ..RetryConfig::default() };

    let calls = AtomicU32::new(0);
    let failing_then_healthy = || {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        async move {
            if n < 3 {
                Err::<(), SdkError>(module_sdk::error::NetworkError::ConnectionFailed("down".to_owned()).into())
            } else {
                Ok(())
            }
        }
    };

    for _ in 0..3 {
        let result = guarded_send(&breaker, &metrics, &retry_config, failing_then_healthy).await;
        assert!(result.is_err());
    }
    assert_eq!(breaker.state().await, BreakerState::Open);

    // Still within cooldown: rejected before the op even runs.
    let rejected = guarded_send(&breaker, &metrics, &retry_config, failing_then_healthy).await;
    assert!(matches!(rejected, Err(SdkError::CircuitBreaker(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    tokio::time::sleep(Duration::from_millis(80)).await;

    let recovered = guarded_send(&breaker, &metrics, &retry_config, failing_then_healthy).await;
    assert!(recovered.is_ok());
    assert_eq!(breaker.state().await, BreakerState::Closed);

    // Availability stays dampened to its floor for 60s after the last
    // recorded failure even though the breaker itself has already
    // recovered.
    assert_eq!(metrics.availability(), 0.8);
}
