//! Streaming engine (§4.H): chunked transfer with per-chunk checksums,
//! sliding-window flow control, a priority queue, and a request
//! multiplexer built on top of the same framing primitives as §4.A.

pub mod multiplexer;
pub mod priority_queue;
pub mod receiver;
pub mod sender;

use rt_wire::EnvelopeMetadata;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// One chunk of a streamed payload, as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub stream_id: String,
    pub sequence: u32,
    pub total_chunks: u32,
    pub crc32: u32,
    pub compressed: bool,
    pub is_final: bool,
    pub data: Vec<u8>,
    #[serde(default)]
    pub metadata: Option<StreamMetadata>,
}

/// Carried on sequence 0 only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMetadata {
    pub total_size: u64,
    pub content_type: Option<String>,
    pub priority: String,
    pub properties: EnvelopeMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkAckStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkAck {
    pub stream_id: String,
    pub sequence: u32,
    pub status: ChunkAckStatus,
    #[serde(default)]
    pub reason: Option<String>,
}
