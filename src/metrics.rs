//! Rolling latency/availability metrics tracker (§4.I).
//!
//! Keeps the last 1000 observed latencies in a ring buffer and a
//! five-minute window of completed-request outcomes, and derives
//! p50/p95/p99/max latency, error rate, throughput, and availability
//! from them on demand. Availability is dampened to 0.8 for 60s after
//! any failure, matching how an orchestrator-side health check would
//! see a blip without reporting a channel as fully dead.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

const HISTORY_CAPACITY: usize = 1000;
const FAILURE_DAMPENING: Duration = Duration::from_secs(60);
const AVAILABILITY_FLOOR: f64 = 0.8;
const RATE_WINDOW: Duration = Duration::from_secs(300);
const THROUGHPUT_WINDOW: Duration = Duration::from_secs(60);

struct Inner {
    latencies: VecDeque<Duration>,
    total_requests: u64,
    total_errors: u64,
    /// Completed requests within the last [`RATE_WINDOW`], used to derive
    /// windowed error rate and throughput.
    window: VecDeque<(Instant, bool)>,
    last_failure: Option<Instant>,
    last_alert: HashMap<AlertKind, Instant>,
}

pub struct MetricsTracker {
    inner: Mutex<Inner>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LatencyPercentiles {
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub max: Duration,
}

/// The six alert kinds named in §4.I, each throttled independently so a
/// sustained latency breach doesn't suppress an unrelated backlog alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    HighLatency,
    HighErrorRate,
    LowThroughput,
    LowAvailability,
    ConnectionFailure,
    QueueBacklog,
}

#[derive(Debug, Clone, Copy)]
pub struct SlaTargets {
    pub max_p95_latency: Duration,
    pub min_availability: f64,
    pub min_throughput: f64,
    pub max_error_rate: f64,
}

/// One `current/target/compliant/difference_percent` comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlaComparison {
    pub current: f64,
    pub target: f64,
    pub compliant: bool,
    pub difference_percent: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct SlaReport {
    pub p95_latency: SlaComparison,
    pub availability: SlaComparison,
    pub throughput: SlaComparison,
    pub error_rate: SlaComparison,
}

impl SlaReport {
    pub fn is_compliant(&self) -> bool {
        self.p95_latency.compliant
            && self.availability.compliant
            && self.throughput.compliant
            && self.error_rate.compliant
    }
}

fn comparison(current: f64, target: f64, compliant: bool) -> SlaComparison {
    let difference_percent = if target == 0.0 {
        if current == 0.0 { 0.0 } else { 100.0 }
    } else {
        (current - target) / target * 100.0
    };
    SlaComparison { current, target, compliant, difference_percent }
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                latencies: VecDeque::with_capacity(HISTORY_CAPACITY),
                total_requests: 0,
                total_errors: 0,
                window: VecDeque::new(),
                last_failure: None,
                last_alert: HashMap::new(),
            }),
        }
    }

    pub fn record_success(&self, latency: Duration) {
        let mut inner = self.inner.lock().expect("metrics mutex poisoned");
        push_bounded(&mut inner.latencies, latency);
        inner.total_requests += 1;
        inner.window.push_back((Instant::now(), true));
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("metrics mutex poisoned");
        inner.total_requests += 1;
        inner.total_errors += 1;
        inner.last_failure = Some(Instant::now());
        inner.window.push_back((Instant::now(), false));
    }

    pub fn percentiles(&self) -> LatencyPercentiles {
        let inner = self.inner.lock().expect("metrics mutex poisoned");
        if inner.latencies.is_empty() {
            return LatencyPercentiles::default();
        }
        let mut sorted: Vec<Duration> = inner.latencies.iter().copied().collect();
        sorted.sort_unstable();
        LatencyPercentiles {
            p50: percentile(&sorted, 0.50),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
            max: *sorted.last().unwrap(),
        }
    }

    /// Error rate over the trailing [`RATE_WINDOW`] (five minutes).
    pub fn error_rate(&self) -> f64 {
        let mut inner = self.inner.lock().expect("metrics mutex poisoned");
        error_rate_locked(&mut inner)
    }

    /// Completed requests per second over the trailing [`THROUGHPUT_WINDOW`]
    /// (one minute).
    pub fn throughput_per_sec(&self) -> f64 {
        let mut inner = self.inner.lock().expect("metrics mutex poisoned");
        throughput_locked(&mut inner)
    }

    /// Availability: the complement of the windowed error rate, floored
    /// at [`AVAILABILITY_FLOOR`] for [`FAILURE_DAMPENING`] after the last
    /// recorded failure.
    pub fn availability(&self) -> f64 {
        let mut inner = self.inner.lock().expect("metrics mutex poisoned");
        availability_locked(&mut inner)
    }

    /// Compare current latency/availability/throughput/error-rate against
    /// `targets`, one `SlaComparison` per metric.
    pub fn sla_report(&self, targets: &SlaTargets) -> SlaReport {
        let mut inner = self.inner.lock().expect("metrics mutex poisoned");

        let p95 = percentiles_locked(&inner).p95;
        let p95_current = p95.as_secs_f64();
        let p95_target = targets.max_p95_latency.as_secs_f64();
        let p95_latency = comparison(p95_current, p95_target, p95_current <= p95_target);

        let availability_current = availability_locked(&mut inner);
        let availability = comparison(
            availability_current,
            targets.min_availability,
            availability_current >= targets.min_availability,
        );

        let throughput_current = throughput_locked(&mut inner);
        let throughput = comparison(
            throughput_current,
            targets.min_throughput,
            throughput_current >= targets.min_throughput,
        );

        let error_rate_current = error_rate_locked(&mut inner);
        let error_rate = comparison(
            error_rate_current,
            targets.max_error_rate,
            error_rate_current <= targets.max_error_rate,
        );

        SlaReport { p95_latency, availability, throughput, error_rate }
    }

    pub fn is_sla_compliant(&self, targets: &SlaTargets) -> bool {
        self.sla_report(targets).is_compliant()
    }

    /// Returns `true` at most once per `throttle` interval for a given
    /// alert kind, so repeated breaches of one kind don't spam alerting
    /// while leaving every other kind's throttle untouched.
    pub fn should_alert(&self, kind: AlertKind, throttle: Duration) -> bool {
        let mut inner = self.inner.lock().expect("metrics mutex poisoned");
        let now = Instant::now();
        match inner.last_alert.get(&kind) {
            Some(last) if now.duration_since(*last) < throttle => false,
            _ => {
                inner.last_alert.insert(kind, now);
                true
            }
        }
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn prune_window(window: &mut VecDeque<(Instant, bool)>) {
    while let Some((t, _)) = window.front() {
        if t.elapsed() > RATE_WINDOW {
            window.pop_front();
        } else {
            break;
        }
    }
}

fn error_rate_locked(inner: &mut Inner) -> f64 {
    prune_window(&mut inner.window);
    if inner.window.is_empty() {
        return 0.0;
    }
    let errors = inner.window.iter().filter(|(_, ok)| !ok).count();
    errors as f64 / inner.window.len() as f64
}

fn throughput_locked(inner: &mut Inner) -> f64 {
    prune_window(&mut inner.window);
    let recent = inner.window.iter().filter(|(t, _)| t.elapsed() <= THROUGHPUT_WINDOW).count();
    recent as f64 / THROUGHPUT_WINDOW.as_secs_f64()
}

fn availability_locked(inner: &mut Inner) -> f64 {
    if let Some(last_failure) = inner.last_failure {
        if last_failure.elapsed() < FAILURE_DAMPENING {
            return AVAILABILITY_FLOOR;
        }
    }
    1.0 - error_rate_locked(inner)
}

fn percentiles_locked(inner: &Inner) -> LatencyPercentiles {
    if inner.latencies.is_empty() {
        return LatencyPercentiles::default();
    }
    let mut sorted: Vec<Duration> = inner.latencies.iter().copied().collect();
    sorted.sort_unstable();
    LatencyPercentiles {
        p50: percentile(&sorted, 0.50),
        p95: percentile(&sorted, 0.95),
        p99: percentile(&sorted, 0.99),
        max: *sorted.last().unwrap(),
    }
}

fn push_bounded(deque: &mut VecDeque<Duration>, value: Duration) {
    if deque.len() == HISTORY_CAPACITY {
        deque.pop_front();
    }
    deque.push_back(value);
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_on_empty_history_are_zero() {
        let tracker = MetricsTracker::new();
        let p = tracker.percentiles();
        assert_eq!(p.p50, Duration::ZERO);
    }

    #[test]
    fn percentiles_reflect_recorded_latencies() {
        let tracker = MetricsTracker::new();
        for ms in [10, 20, 30, 40, 100] {
            tracker.record_success(Duration::from_millis(ms));
        }
        let p = tracker.percentiles();
        assert_eq!(p.max, Duration::from_millis(100));
    }

    #[test]
    fn error_rate_tracks_failures_over_total() {
        let tracker = MetricsTracker::new();
        tracker.record_success(Duration::from_millis(1));
        tracker.record_failure();
        assert!((tracker.error_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn availability_dampens_to_floor_immediately_after_failure() {
        let tracker = MetricsTracker::new();
        tracker.record_success(Duration::from_millis(1));
        tracker.record_failure();
        assert_eq!(tracker.availability(), AVAILABILITY_FLOOR);
    }

    #[test]
    fn throughput_counts_requests_in_the_trailing_minute() {
        let tracker = MetricsTracker::new();
        for _ in 0..5 {
            tracker.record_success(Duration::from_millis(1));
        }
        let throughput = tracker.throughput_per_sec();
        assert!((throughput - 5.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn sla_report_flags_latency_breach_but_not_others() {
        let tracker = MetricsTracker::new();
        tracker.record_success(Duration::from_millis(500));
        let targets = SlaTargets {
            max_p95_latency: Duration::from_millis(100),
            min_availability: 0.5,
            min_throughput: 0.0,
            max_error_rate: 1.0,
        };
        let report = tracker.sla_report(&targets);
        assert!(!report.p95_latency.compliant);
        assert!(report.p95_latency.difference_percent > 0.0);
        assert!(report.availability.compliant);
        assert!(!report.is_compliant());
        assert!(!tracker.is_sla_compliant(&targets));
    }

    #[test]
    fn should_alert_throttles_independently_per_kind() {
        let tracker = MetricsTracker::new();
        assert!(tracker.should_alert(AlertKind::HighLatency, Duration::from_secs(60)));
        assert!(!tracker.should_alert(AlertKind::HighLatency, Duration::from_secs(60)));
        // A different alert kind has its own throttle and is unaffected.
        assert!(tracker.should_alert(AlertKind::QueueBacklog, Duration::from_secs(60)));
    }

    #[test]
    fn history_ring_buffer_is_bounded() {
        let tracker = MetricsTracker::new();
        for _ in 0..(HISTORY_CAPACITY + 10) {
            tracker.record_success(Duration::from_millis(1));
        }
        let inner = tracker.inner.lock().unwrap();
        assert_eq!(inner.latencies.len(), HISTORY_CAPACITY);
    }
}
