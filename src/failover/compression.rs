//! Conditional gzip compression for oversized payloads (§4.G step 5).
//!
//! Compression is only kept if it actually shrinks the payload; callers
//! mark the envelope metadata with `compressed=gzip` so the receiving
//! side knows to invert it.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::error::MessageError;

pub const COMPRESSED_PROPERTY: &str = "compressed";
pub const COMPRESSED_GZIP: &str = "gzip";

/// Compress `data` if it's at least `threshold` bytes and gzip actually
/// shrinks it. Returns `None` when compression isn't worth applying.
pub fn compress_if_beneficial(data: &[u8], threshold: usize) -> Option<Vec<u8>> {
    if data.len() < threshold {
        return None;
    }
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).ok()?;
    let compressed = encoder.finish().ok()?;
    if compressed.len() < data.len() { Some(compressed) } else { None }
}

pub fn decompress(data: &[u8]) -> Result<Vec<u8>, MessageError> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| MessageError::InvalidFormat(format!("gzip decode failed: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_payload_is_not_compressed() {
        assert!(compress_if_beneficial(b"hi", 1024).is_none());
    }

    #[test]
    fn compressible_payload_roundtrips() {
        let data = vec![b'a'; 10_000];
        let compressed = compress_if_beneficial(&data, 100).expect("should compress");
        assert!(compressed.len() < data.len());
        let back = decompress(&compressed).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn incompressible_payload_is_rejected() {
        // Already-random-ish data that gzip can't usefully shrink below threshold.
        let data: Vec<u8> = (0..2000u32).map(|i| (i % 251) as u8).collect();
        let threshold = 1;
        // Pathological small inputs can still grow under gzip's framing overhead;
        // this asserts the "keep only if smaller" contract, not a specific ratio.
        if let Some(compressed) = compress_if_beneficial(&data, threshold) {
            assert!(compressed.len() < data.len());
        }
    }
}
