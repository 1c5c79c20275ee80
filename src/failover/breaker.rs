//! Per-channel circuit breaker (§3 "Circuit breaker", §4.G.1).
//!
//! Transitions strictly along `closed → open → half-open → closed|open`.
//! A `tokio::sync::Mutex` guards the window counters since transitions
//! happen on the same suspension points as channel IO (§5).

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout: Duration,
    pub window_size: Duration,
    pub minimum_requests: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 1,
            timeout: Duration::from_secs(60),
            window_size: Duration::from_secs(300),
            minimum_requests: 1,
        }
    }
}

struct Window {
    successes: u32,
    failures: u32,
    total: u32,
    started_at: Instant,
}

impl Window {
    fn fresh() -> Self {
        Self { successes: 0, failures: 0, total: 0, started_at: Instant::now() }
    }
}

struct Inner {
    state: BreakerState,
    window: Window,
    last_failure: Option<Instant>,
    opened_at: Option<Instant>,
}

/// A circuit breaker keyed externally by channel kind (callers keep one
/// instance per channel; the breaker itself doesn't care about the key).
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                window: Window::fresh(),
                last_failure: None,
                opened_at: None,
            }),
        }
    }

    /// Whether a call may proceed right now. Advances `open` → `half-open`
    /// once the cooldown has elapsed, without requiring a separate poll task.
    pub async fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let opened_at = inner.opened_at.unwrap_or_else(Instant::now);
                if opened_at.elapsed() >= self.config.timeout {
                    inner.state = BreakerState::HalfOpen;
                    inner.window = Window::fresh();
                    true
                } else {
                    false
                }
            }
        }
    }

    pub async fn state(&self) -> BreakerState {
        self.inner.lock().await.state
    }

    pub async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        self.reset_window_if_stale(&mut inner);
        inner.window.successes += 1;
        inner.window.total += 1;
        match inner.state {
            BreakerState::HalfOpen if inner.window.successes >= self.config.success_threshold => {
                inner.state = BreakerState::Closed;
                inner.window = Window::fresh();
                inner.opened_at = None;
            }
            _ => {}
        }
    }

    pub async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        self.reset_window_if_stale(&mut inner);
        inner.window.failures += 1;
        inner.window.total += 1;
        inner.last_failure = Some(Instant::now());

        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.window = Window::fresh();
            }
            BreakerState::Closed => {
                if inner.window.total >= self.config.minimum_requests
                    && inner.window.failures >= self.config.failure_threshold
                {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            BreakerState::Open => {}
        }
    }

    fn reset_window_if_stale(&self, inner: &mut Inner) {
        if inner.window.started_at.elapsed() >= self.config.window_size {
            inner.window = Window::fresh();
        }
    }
}
