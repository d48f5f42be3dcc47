//! Per-operation resource accounting.
//!
//! A [`ResourceGuard`] is created fresh for each `extract`/`scan` call and
//! charged incrementally as entries and decompressed bytes stream through.
//! Checks happen mid-stream, between read chunks, so a decompression bomb is
//! stopped while inflating rather than after it has landed on disk.

use crate::error::{ErrorCode, FulpackError, Operation};

/// Default ceiling for cumulative extracted bytes: 1 GiB.
pub const DEFAULT_MAX_BYTES: u64 = 1024 * 1024 * 1024;

/// Default ceiling for archive entry count.
pub const DEFAULT_MAX_ENTRIES: u64 = 100_000;

/// Archive-level `uncompressed / compressed` ratio above which `verify`
/// reports a warning. Sparse or highly repetitive data can exceed this
/// legitimately, so it is never a hard failure.
pub const RATIO_WARN_THRESHOLD: f64 = 100.0;

/// Tracks entry and byte consumption against configured ceilings.
#[derive(Debug, Clone)]
pub struct ResourceGuard {
    max_bytes: u64,
    max_entries: u64,
    entries: u64,
    bytes: u64,
    operation: Operation,
}

impl ResourceGuard {
    pub fn new(max_bytes: u64, max_entries: u64, operation: Operation) -> Self {
        Self {
            max_bytes,
            max_entries,
            entries: 0,
            bytes: 0,
            operation,
        }
    }

    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Charge one entry record. Exceeding the entry ceiling is fatal for the
    /// operation: unbounded entry lists are themselves a resource risk.
    pub fn charge_entry(&mut self) -> Result<(), FulpackError> {
        self.entries = self.entries.saturating_add(1);
        if self.entries > self.max_entries {
            return Err(FulpackError::new(
                ErrorCode::DecompressionBomb,
                self.operation,
                format!("archive exceeds entry ceiling of {}", self.max_entries),
            )
            .with_detail("max_entries", self.max_entries));
        }
        Ok(())
    }

    /// Charge decompressed output bytes. Called once per stream chunk.
    pub fn charge_bytes(&mut self, n: u64) -> Result<(), FulpackError> {
        self.bytes = self.bytes.saturating_add(n);
        if self.bytes > self.max_bytes {
            return Err(FulpackError::new(
                ErrorCode::DecompressionBomb,
                self.operation,
                format!("cumulative extracted bytes exceed ceiling of {}", self.max_bytes),
            )
            .with_detail("max_bytes", self.max_bytes)
            .with_detail("seen_bytes", self.bytes));
        }
        Ok(())
    }

    /// Reject an entry whose declared size alone would bust the byte
    /// ceiling, before any of it is inflated. Does not charge; the streamed
    /// bytes are charged as they arrive.
    pub fn check_claim(&self, claimed: u64) -> Result<(), FulpackError> {
        if self.bytes.saturating_add(claimed) > self.max_bytes {
            return Err(FulpackError::new(
                ErrorCode::DecompressionBomb,
                self.operation,
                format!(
                    "entry declares {claimed} bytes, exceeding the ceiling of {}",
                    self.max_bytes
                ),
            )
            .with_detail("max_bytes", self.max_bytes)
            .with_detail("claimed_bytes", claimed));
        }
        Ok(())
    }

    /// Whether an error produced by this guard should abort the remaining
    /// entries. Guard violations are the one per-entry condition that
    /// escalates: an archive shown to be adversarial is not trusted further.
    pub fn is_violation(err: &FulpackError) -> bool {
        err.code == ErrorCode::DecompressionBomb
    }
}

/// Archive-level ratio warning, shared by `verify` and `info` reporting.
pub fn ratio_warning(total_size: u64, compressed_size: u64) -> Option<String> {
    if compressed_size == 0 || total_size == 0 {
        return None;
    }
    let ratio = total_size as f64 / compressed_size as f64;
    if ratio > RATIO_WARN_THRESHOLD {
        Some(format!(
            "compression ratio {:.1}:1 exceeds {}:1; possible decompression bomb",
            ratio, RATIO_WARN_THRESHOLD as u64
        ))
    } else {
        None
    }
}

/// `total_size / compressed_size`, defined as 1.0 for empty content so
/// callers never divide by zero.
pub fn compression_ratio(total_size: u64, compressed_size: u64) -> f64 {
    if total_size == 0 || compressed_size == 0 {
        1.0
    } else {
        total_size as f64 / compressed_size as f64
    }
}
