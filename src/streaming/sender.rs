//! Streaming sender (§4.H.1): splits a payload into chunks and drives a
//! sliding window of in-flight sequences until every chunk is acked.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use crc32fast::Hasher;
use uuid::Uuid;

use super::{ChunkAckStatus, StreamChunk, StreamMetadata, DEFAULT_CHUNK_SIZE};
use crate::error::MessageError;
use crate::failover::compression;

#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub chunk_size: usize,
    pub window_size: usize,
    pub ack_timeout: Duration,
    pub max_retries: u32,
    pub compression_threshold: usize,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            window_size: 4,
            ack_timeout: Duration::from_secs(30),
            max_retries: 3,
            compression_threshold: 4096,
        }
    }
}

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Split `payload` into chunks per `config`, attaching `metadata` to
/// sequence 0 only. A zero-length payload produces a single empty,
/// final chunk at sequence 0.
pub fn build_chunks(
    stream_id: &str,
    payload: &[u8],
    config: &SenderConfig,
    metadata: StreamMetadata,
) -> Vec<StreamChunk> {
    if payload.is_empty() {
        return vec![StreamChunk {
            stream_id: stream_id.to_owned(),
            sequence: 0,
            total_chunks: 1,
            crc32: checksum(&[]),
            compressed: false,
            is_final: true,
            data: Vec::new(),
            metadata: Some(metadata),
        }];
    }

    let raw_chunks: Vec<&[u8]> = payload.chunks(config.chunk_size.max(1)).collect();
    let total_chunks = raw_chunks.len() as u32;

    raw_chunks
        .into_iter()
        .enumerate()
        .map(|(i, raw)| {
            let (data, compressed) = match compression::compress_if_beneficial(raw, config.compression_threshold) {
                Some(compressed) => (compressed, true),
                None => (raw.to_vec(), false),
            };
            // Checksum the on-wire bytes (post-compression when compressed),
            // matching what the receiver hashes before decompressing.
            let crc32 = checksum(&data);
            StreamChunk {
                stream_id: stream_id.to_owned(),
                sequence: i as u32,
                total_chunks,
                crc32,
                compressed,
                is_final: i as u32 + 1 == total_chunks,
                data,
                metadata: if i == 0 { Some(metadata.clone()) } else { None },
            }
        })
        .collect()
}

/// Pure sliding-window state machine; the caller drives actual IO and
/// feeds outcomes back in via [`SenderWindow::on_ack`] /
/// [`SenderWindow::check_timeouts`].
pub struct SenderWindow {
    pub stream_id: String,
    chunks: Vec<StreamChunk>,
    pending: VecDeque<u32>,
    in_flight: HashMap<u32, Instant>,
    acknowledged: HashMap<u32, bool>,
    retry_counts: HashMap<u32, u32>,
    window_size: usize,
    ack_timeout: Duration,
    max_retries: u32,
}

impl SenderWindow {
    pub fn new(stream_id: String, chunks: Vec<StreamChunk>, config: &SenderConfig) -> Self {
        let pending = (0..chunks.len() as u32).collect();
        Self {
            stream_id,
            chunks,
            pending,
            in_flight: HashMap::new(),
            acknowledged: HashMap::new(),
            retry_counts: HashMap::new(),
            window_size: config.window_size.max(1),
            ack_timeout: config.ack_timeout,
            max_retries: config.max_retries,
        }
    }

    /// Sequences that may be sent right now without exceeding the window.
    pub fn drain_sendable(&mut self) -> Vec<StreamChunk> {
        let mut out = Vec::new();
        while self.in_flight.len() < self.window_size {
            let Some(seq) = self.pending.pop_front() else { break };
            self.in_flight.insert(seq, Instant::now());
            out.push(self.chunks[seq as usize].clone());
        }
        out
    }

    pub fn on_ack(&mut self, sequence: u32, status: ChunkAckStatus) -> Result<(), MessageError> {
        self.in_flight.remove(&sequence);
        match status {
            ChunkAckStatus::Success => {
                self.acknowledged.insert(sequence, true);
                Ok(())
            }
            ChunkAckStatus::Failure => self.requeue(sequence),
        }
    }

    /// Check in-flight chunks against `ack_timeout`; requeues any that
    /// have expired. Returns an error once a chunk exceeds `max_retries`.
    pub fn check_timeouts(&mut self) -> Result<(), MessageError> {
        let expired: Vec<u32> = self
            .in_flight
            .iter()
            .filter(|(_, sent_at)| sent_at.elapsed() >= self.ack_timeout)
            .map(|(seq, _)| *seq)
            .collect();
        for seq in expired {
            self.in_flight.remove(&seq);
            self.requeue(seq)?;
        }
        Ok(())
    }

    fn requeue(&mut self, sequence: u32) -> Result<(), MessageError> {
        let retries = self.retry_counts.entry(sequence).or_insert(0);
        *retries += 1;
        if *retries > self.max_retries {
            return Err(MessageError::InvalidFormat(format!(
                "chunk {sequence} of stream {} exceeded max retries",
                self.stream_id
            )));
        }
        self.pending.push_front(sequence);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.acknowledged.len() == self.chunks.len() && self.acknowledged.values().all(|ok| *ok)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

pub fn new_stream_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rt_wire::EnvelopeMetadata;

    fn metadata(total_size: u64) -> StreamMetadata {
        StreamMetadata {
            total_size,
            content_type: None,
            priority: "normal".to_owned(),
            properties: EnvelopeMetadata::default(),
        }
    }

    #[test]
    fn splits_payload_into_expected_chunk_count() {
        let payload = vec![0u8; 200 * 1024];
        let config = SenderConfig { chunk_size: 64 * 1024, ..SenderConfig::default() };
        let chunks = build_chunks("s1", &payload, &config, metadata(payload.len() as u64));
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[3].data.len(), 8 * 1024);
        assert!(chunks[3].is_final);
        assert!(chunks[0].metadata.is_some());
        assert!(chunks[1].metadata.is_none());
    }

    #[test]
    fn zero_length_payload_is_single_final_chunk() {
        let config = SenderConfig::default();
        let chunks = build_chunks("s1", &[], &config, metadata(0));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].sequence, 0);
        assert_eq!(chunks[0].total_chunks, 1);
        assert!(chunks[0].is_final);
    }

    #[test]
    fn window_never_exceeds_configured_size() {
        let config = SenderConfig { window_size: 2, chunk_size: 10, ..SenderConfig::default() };
        let chunks = build_chunks("s1", &vec![1u8; 50], &config, metadata(50));
        let mut window = SenderWindow::new("s1".to_owned(), chunks, &config);
        let first = window.drain_sendable();
        assert_eq!(first.len(), 2);
        assert_eq!(window.in_flight_count(), 2);
        let second = window.drain_sendable();
        assert!(second.is_empty());
    }

    #[test]
    fn completes_once_every_sequence_acked() {
        let config = SenderConfig { window_size: 10, chunk_size: 10, ..SenderConfig::default() };
        let chunks = build_chunks("s1", &vec![1u8; 25], &config, metadata(25));
        let n = chunks.len() as u32;
        let mut window = SenderWindow::new("s1".to_owned(), chunks, &config);
        window.drain_sendable();
        for seq in 0..n {
            window.on_ack(seq, ChunkAckStatus::Success).unwrap();
        }
        assert!(window.is_complete());
    }

    #[test]
    fn exceeding_max_retries_raises_fatal_error() {
        let config = SenderConfig { window_size: 1, max_retries: 1, chunk_size: 10, ..SenderConfig::default() };
        let chunks = build_chunks("s1", &vec![1u8; 10], &config, metadata(10));
        let mut window = SenderWindow::new("s1".to_owned(), chunks, &config);
        window.drain_sendable();
        window.on_ack(0, ChunkAckStatus::Failure).unwrap();
        window.drain_sendable();
        let err = window.on_ack(0, ChunkAckStatus::Failure);
        assert!(err.is_err());
    }
}
