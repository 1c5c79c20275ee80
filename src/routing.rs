//! Routing engine (§4.F): pick a transport per message characteristics,
//! cache the decision, and bias toward healthier channels under load.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::channel::ChannelKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
    Bulk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    RealTime,
    FileTransfer,
    Batch,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Local,
    Remote,
    Unknown,
}

/// Classify a target string as local (loopback / unix-socket path) or
/// remote; anything unparseable is `Unknown`.
pub fn classify_target(target: &str) -> Target {
    if target.starts_with('/') || target.starts_with("unix:") {
        return Target::Local;
    }
    if let Some((host, _port)) = target.rsplit_once(':') {
        if host == "127.0.0.1" || host == "localhost" || host == "::1" {
            return Target::Local;
        }
        return Target::Remote;
    }
    Target::Unknown
}

#[derive(Debug, Clone, Copy)]
pub struct Characteristics {
    pub size: usize,
    pub priority: Priority,
    pub message_type: MessageType,
    pub requires_ack: bool,
    pub timeout: Option<Duration>,
    pub retryable: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ChannelPredicates {
    pub max_size: Option<usize>,
    pub min_health: Option<f64>,
    pub max_latency: Option<Duration>,
    pub min_throughput: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelHealthSnapshot {
    pub availability: f64,
    pub error_rate: f64,
    pub p95_latency: Duration,
    pub throughput: f64,
}

/// Decide primary/fallback channel kinds per the ordered decision table
/// in §4.F. First applicable row wins.
pub fn decide_candidates(target: Target, chars: Characteristics) -> (ChannelKind, Option<ChannelKind>) {
    use ChannelKind::{Tcp, Unix};
    use MessageType::{Batch, FileTransfer, RealTime};
    use Priority::{Bulk, Critical, High};

    if matches!(chars.priority, Critical | High) || chars.message_type == RealTime {
        return (Unix, Some(Tcp));
    }
    if chars.message_type == FileTransfer {
        return (Tcp, None);
    }
    if chars.priority == Bulk || chars.message_type == Batch {
        return (Tcp, None);
    }
    if target == Target::Remote {
        return (Tcp, None);
    }
    if target == Target::Local && chars.size < 1024 {
        return (Unix, Some(Tcp));
    }
    (Tcp, Some(Unix))
}

/// Confidence score for a candidate, combining availability, error rate,
/// latency, and a small bonus for high-priority traffic.
pub fn confidence_score(health: ChannelHealthSnapshot, priority: Priority) -> f64 {
    let latency_score = 1.0 - (health.p95_latency.as_secs_f64() / 1.0).min(1.0);
    let mut score = 0.5 * health.availability + 0.3 * (1.0 - health.error_rate) + 0.2 * latency_score;
    if matches!(priority, Priority::Critical | Priority::High) {
        score += 0.05;
    }
    score.clamp(0.0, 1.0)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    target: &'static str,
    priority: &'static str,
    message_type: &'static str,
    size_bucket: usize,
}

fn bucket_size(size: usize) -> usize {
    // Coarse bucketing keeps the cache from being invalidated by
    // byte-for-byte size differences on otherwise-identical traffic.
    size.next_power_of_two().trailing_zeros() as usize
}

fn target_label(t: Target) -> &'static str {
    match t {
        Target::Local => "local",
        Target::Remote => "remote",
        Target::Unknown => "unknown",
    }
}

fn priority_label(p: Priority) -> &'static str {
    match p {
        Priority::Critical => "critical",
        Priority::High => "high",
        Priority::Normal => "normal",
        Priority::Low => "low",
        Priority::Bulk => "bulk",
    }
}

fn type_label(t: MessageType) -> &'static str {
    match t {
        MessageType::RealTime => "real_time",
        MessageType::FileTransfer => "file_transfer",
        MessageType::Batch => "batch",
        MessageType::Generic => "generic",
    }
}

struct CachedDecision {
    primary: ChannelKind,
    fallback: Option<ChannelKind>,
    cached_at: Instant,
}

/// TTL-capped decision cache, evicting the oldest quarter on overflow.
pub struct RoutingEngine {
    cache: HashMap<CacheKey, CachedDecision>,
    ttl: Duration,
    max_entries: usize,
    load_balance: HashMap<ChannelKind, i64>,
}

impl RoutingEngine {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self { cache: HashMap::new(), ttl, max_entries, load_balance: HashMap::new() }
    }

    pub fn decide(&mut self, target: Target, chars: Characteristics) -> (ChannelKind, Option<ChannelKind>) {
        let key = CacheKey {
            target: target_label(target),
            priority: priority_label(chars.priority),
            message_type: type_label(chars.message_type),
            size_bucket: bucket_size(chars.size.max(1)),
        };

        if let Some(cached) = self.cache.get(&key) {
            if cached.cached_at.elapsed() < self.ttl {
                return (cached.primary, cached.fallback);
            }
        }

        let (primary, fallback) = decide_candidates(target, chars);

        if self.cache.len() >= self.max_entries {
            self.evict_oldest_quarter();
        }
        self.cache
            .insert(key, CachedDecision { primary, fallback, cached_at: Instant::now() });

        (primary, fallback)
    }

    /// Invalidate every cached decision (e.g. the decision matrix changed).
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    fn evict_oldest_quarter(&mut self) {
        let to_evict = (self.cache.len() / 4).max(1);
        let mut entries: Vec<_> = self.cache.iter().map(|(k, v)| (k.clone(), v.cached_at)).collect();
        entries.sort_by_key(|(_, cached_at)| *cached_at);
        for (key, _) in entries.into_iter().take(to_evict) {
            self.cache.remove(&key);
        }
    }

    /// Nudge the load-balance counter for `kind` down on success, up on
    /// failure; lower counters are preferred when multiple candidates
    /// satisfy the predicates.
    pub fn record_outcome(&mut self, kind: ChannelKind, success: bool, learning_rate: i64) {
        let counter = self.load_balance.entry(kind).or_insert(0);
        *counter += if success { -learning_rate } else { learning_rate };
    }

    /// Pick the least-loaded candidate among those that satisfy the
    /// optional predicates (predicate evaluation happens at the call
    /// site, which has channel state; this just orders the survivors).
    pub fn least_loaded<'a>(&self, candidates: impl Iterator<Item = &'a ChannelKind>) -> Option<ChannelKind> {
        candidates.min_by_key(|k| self.load_balance.get(*k).copied().unwrap_or(0)).copied()
    }
}
