// Scenario 6: repeated routing decisions reuse the TTL cache, evict
// under overflow, and load-balancing counters steer traffic toward the
// channel with the better track record.

use std::time::Duration;

use module_sdk::channel::ChannelKind;
use module_sdk::routing::{Characteristics, MessageType, Priority, RoutingEngine, Target};

fn chars(size: usize, priority: Priority, message_type: MessageType) -> Characteristics {
    Characteristics { size, priority, message_type, requires_ack: false, timeout: None, retryable: true }
}

#[test]
fn repeated_identical_traffic_reuses_the_cached_decision() {
    let mut engine = RoutingEngine::new(Duration::from_secs(30), 100);
    let c = chars(512, Priority::Normal, MessageType::Generic);

    let mut decisions = Vec::new();
    for _ in 0..50 {
        decisions.push(engine.decide(Target::Local, c));
    }

    assert!(decisions.iter().all(|d| *d == decisions[0]));
}

#[test]
fn distinct_traffic_shapes_overflow_the_cache_and_evict_the_oldest_quarter() {
    let mut engine = RoutingEngine::new(Duration::from_secs(30), 8);

    for size_pow in 0..32u32 {
        let size = 1usize << size_pow.min(20);
        engine.decide(Target::Remote, chars(size, Priority::Low, MessageType::Batch));
        engine.decide(Target::Local, chars(size, Priority::High, MessageType::RealTime));
    }

    assert!(engine.least_loaded([ChannelKind::Tcp, ChannelKind::Unix].iter()).is_some());
}

#[test]
fn load_balancer_steers_away_from_the_channel_with_more_failures() {
    let mut engine = RoutingEngine::new(Duration::from_secs(30), 100);

    // Simulate a burst of traffic: Tcp fails far more often than Unix.
    for i in 0..40 {
        let tcp_ok = i % 5 == 0; // Tcp succeeds 1 in 5
        let unix_ok = i % 5 != 0; // Unix succeeds 4 in 5
        engine.record_outcome(ChannelKind::Tcp, tcp_ok, 1);
        engine.record_outcome(ChannelKind::Unix, unix_ok, 1);
    }

    let candidates = [ChannelKind::Tcp, ChannelKind::Unix];
    assert_eq!(engine.least_loaded(candidates.iter()), Some(ChannelKind::Unix));
}

#[test]
fn invalidate_all_forces_fresh_decisions_after_a_routing_table_change() {
    let mut engine = RoutingEngine::new(Duration::from_secs(30), 100);
    let c = chars(128, Priority::Normal, MessageType::Generic);

    engine.decide(Target::Local, c);
    engine.invalidate_all();

    // Not asserting internal cache size (private); re-deciding after
    // invalidation must still produce a consistent, valid candidate.
    let (primary, _fallback) = engine.decide(Target::Local, c);
    assert!(matches!(primary, ChannelKind::Tcp | ChannelKind::Unix));
}
