// Scenario 4: a payload is split into chunks, sent through a window
// bounded by `window_size` with chunks arriving out of order, and
// reassembled on the receiving end once every sequence is acked.

use module_sdk::streaming::receiver::StreamReceiver;
use module_sdk::streaming::sender::{build_chunks, SenderConfig, SenderWindow};
use module_sdk::streaming::{ChunkAckStatus, StreamMetadata};
use rt_wire::EnvelopeMetadata;

fn metadata(total_size: u64) -> StreamMetadata {
    StreamMetadata { total_size, content_type: Some("application/octet-stream".to_owned()), priority: "normal".to_owned(), properties: EnvelopeMetadata::default() }
}

#[test]
fn full_payload_round_trips_through_a_bounded_window_out_of_order() {
    let config = SenderConfig { chunk_size: 17, window_size: 3, max_retries: 2, ..SenderConfig::default() };
    let payload: Vec<u8> = (0..200u32).map(|i| (i % 251) as u8).collect();

    let chunks = build_chunks("stream-1", &payload, &config, metadata(payload.len() as u64));
    let expected_chunks = chunks.len();
    let mut window = SenderWindow::new("stream-1".to_owned(), chunks, &config);
    let mut receiver = StreamReceiver::new("stream-1".to_owned());

    let mut reassembled = None;
    let mut rounds = 0;
    while !window.is_complete() {
        rounds += 1;
        assert!(rounds < 100, "window never converged");

        let mut batch = window.drain_sendable();
        assert!(batch.len() <= 3, "window exceeded configured size");
        if batch.is_empty() && window.in_flight_count() == 0 {
            break;
        }

        // Deliver this round's chunks to the receiver in reverse order,
        // exercising out-of-order arrival within a window.
        batch.reverse();
        for chunk in batch {
            let sequence = chunk.sequence;
            let (ack, maybe_payload) = receiver.accept(chunk);
            window.on_ack(sequence, ack.status).unwrap();
            if let Some(p) = maybe_payload {
                reassembled = Some(p);
            }
        }
    }

    assert!(window.is_complete());
    assert_eq!(window.in_flight_count(), 0);
    let reassembled = reassembled.expect("stream never completed on the receiver side");
    assert_eq!(reassembled, payload);
    assert_eq!(receiver.metadata.as_ref().unwrap().total_size, payload.len() as u64);
    assert!(expected_chunks > 1);
}

#[test]
fn a_permanently_failing_chunk_is_fatal_once_retries_are_exhausted() {
    let config = SenderConfig { chunk_size: 16, window_size: 1, max_retries: 2, ..SenderConfig::default() };
    let chunks = build_chunks("stream-2", &vec![7u8; 16], &config, metadata(16));
    let mut window = SenderWindow::new("stream-2".to_owned(), chunks, &config);

    for _ in 0..2 {
        window.drain_sendable();
        window.on_ack(0, ChunkAckStatus::Failure).unwrap();
    }
    window.drain_sendable();
    assert!(window.on_ack(0, ChunkAckStatus::Failure).is_err());
}
