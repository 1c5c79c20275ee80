//! Streaming receiver (§4.H.2): verifies, decompresses, and reassembles
//! chunks strictly in sequence order once every sequence has arrived.

use std::collections::HashMap;

use crc32fast::Hasher;

use super::{ChunkAck, ChunkAckStatus, StreamChunk, StreamMetadata};
use crate::error::MessageError;
use crate::failover::compression;

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

pub struct StreamReceiver {
    stream_id: String,
    received: HashMap<u32, Vec<u8>>,
    total_chunks: Option<u32>,
    pub metadata: Option<StreamMetadata>,
}

impl StreamReceiver {
    pub fn new(stream_id: String) -> Self {
        Self { stream_id, received: HashMap::new(), total_chunks: None, metadata: None }
    }

    /// Process one inbound chunk. Returns the ack to send back, and —
    /// once every sequence has been received — the reassembled payload.
    pub fn accept(&mut self, chunk: StreamChunk) -> (ChunkAck, Option<Vec<u8>>) {
        if chunk.sequence == 0 {
            self.metadata = chunk.metadata.clone();
        }
        self.total_chunks = Some(chunk.total_chunks);

        let payload = if chunk.compressed {
            match compression::decompress(&chunk.data) {
                Ok(data) => data,
                Err(e) => {
                    return (
                        self.nack(chunk.sequence, format!("decompression failed: {e}")),
                        None,
                    );
                }
            }
        } else {
            chunk.data.clone()
        };

        // Checksum is computed over the on-wire (possibly compressed) bytes,
        // matching what the sender hashed before compressing.
        let wire_bytes = if chunk.compressed { &chunk.data } else { &payload };
        if checksum(wire_bytes) != chunk.crc32 {
            return (self.nack(chunk.sequence, "checksum mismatch".to_owned()), None);
        }

        self.received.insert(chunk.sequence, payload);

        let ack = ChunkAck {
            stream_id: self.stream_id.clone(),
            sequence: chunk.sequence,
            status: ChunkAckStatus::Success,
            reason: None,
        };

        if chunk.is_final && self.all_received() {
            let reassembled = self.reassemble();
            return (ack, Some(reassembled));
        }
        (ack, None)
    }

    fn nack(&self, sequence: u32, reason: String) -> ChunkAck {
        ChunkAck { stream_id: self.stream_id.clone(), sequence, status: ChunkAckStatus::Failure, reason: Some(reason) }
    }

    fn all_received(&self) -> bool {
        match self.total_chunks {
            Some(total) => (0..total).all(|seq| self.received.contains_key(&seq)),
            None => false,
        }
    }

    fn reassemble(&self) -> Vec<u8> {
        let mut sequences: Vec<&u32> = self.received.keys().collect();
        sequences.sort();
        sequences.into_iter().flat_map(|seq| self.received[seq].clone()).collect()
    }
}

#[allow(dead_code)]
pub type ReassemblyResult = Result<Vec<u8>, MessageError>;
