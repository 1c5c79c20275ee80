//! Batch accumulator (§4.G.1).
//!
//! `max_batch_bytes` is enforced as the real cap on an open batch's byte
//! total (the source implementation this was distilled from only guards
//! against `i32::MAX` overflow on the running byte counter; this
//! implementation treats that overflow guard as a second, independent
//! check rather than conflating the two, per the design note in §9).

use std::time::{Duration, Instant};

use crate::framing::Envelope;

const OVERFLOW_GUARD: usize = i32::MAX as usize;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub max_batch_size: usize,
    pub max_batch_bytes: usize,
    pub max_batch_delay: Duration,
    pub preserve_order: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            max_batch_bytes: 1024 * 1024,
            max_batch_delay: Duration::from_millis(100),
            preserve_order: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("envelope of {size} bytes exceeds max_batch_bytes ({cap})")]
    EnvelopeTooLarge { size: usize, cap: usize },
}

pub struct Batcher {
    config: BatchConfig,
    pending: Vec<Envelope>,
    pending_bytes: usize,
    opened_at: Option<Instant>,
}

impl Batcher {
    pub fn new(config: BatchConfig) -> Self {
        Self { config, pending: Vec::new(), pending_bytes: 0, opened_at: None }
    }

    /// Add an envelope to the open batch. Returns `Ok(Some(batch))` if
    /// adding this envelope fills the batch (by count or bytes) and the
    /// batch should be flushed immediately; `Ok(None)` otherwise.
    pub fn add(&mut self, envelope: Envelope) -> Result<Option<Vec<Envelope>>, BatchError> {
        let size = envelope.data.len();
        if size > self.config.max_batch_bytes {
            return Err(BatchError::EnvelopeTooLarge { size, cap: self.config.max_batch_bytes });
        }
        if self.pending_bytes + size > OVERFLOW_GUARD {
            return Err(BatchError::EnvelopeTooLarge { size, cap: OVERFLOW_GUARD });
        }

        if self.opened_at.is_none() {
            self.opened_at = Some(Instant::now());
        }
        self.pending_bytes += size;
        self.pending.push(envelope);

        if self.pending.len() >= self.config.max_batch_size
            || self.pending_bytes >= self.config.max_batch_bytes
        {
            return Ok(Some(self.take()));
        }
        Ok(None)
    }

    /// Whether the open batch has aged past `max_batch_delay` and should
    /// be flushed even though it hasn't filled by count or bytes.
    pub fn is_stale(&self) -> bool {
        self.opened_at.is_some_and(|t| t.elapsed() >= self.config.max_batch_delay)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Flush whatever is pending, regardless of fill level.
    pub fn flush(&mut self) -> Vec<Envelope> {
        self.take()
    }

    fn take(&mut self) -> Vec<Envelope> {
        self.opened_at = None;
        self.pending_bytes = 0;
        std::mem::take(&mut self.pending)
    }
}
