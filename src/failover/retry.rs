//! Retry engine: jittered exponential backoff (§4.G step 2).

use std::future::Future;
use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Half-width of the multiplicative jitter, e.g. `0.1` for ±10%.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

fn jittered(delay: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor <= 0.0 {
        return delay;
    }
    let mut rng = rand::thread_rng();
    let factor = 1.0 + rng.gen_range(-jitter_factor / 2.0..=jitter_factor / 2.0);
    Duration::from_secs_f64((delay.as_secs_f64() * factor).max(0.0))
}

/// Run `op` up to `config.max_attempts` times, backing off between tries.
/// Returns the last error if every attempt fails. `max_attempts == 1`
/// attempts exactly once, with no delay ever observed.
pub async fn retry<T, E, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut delay = config.initial_delay;
    let mut last_err = None;
    for attempt in 1..=config.max_attempts.max(1) {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                last_err = Some(e);
                if attempt == config.max_attempts {
                    break;
                }
                tokio::time::sleep(jittered(delay, config.jitter_factor)).await;
                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * config.multiplier).min(config.max_delay.as_secs_f64()),
                );
            }
        }
    }
    Err(last_err.expect("at least one attempt was made"))
}
