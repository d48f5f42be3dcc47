//! Per-call configuration.
//!
//! Options are plain immutable structs constructed per call; defaults come
//! from `Default` impls and explicit fields always win. Each struct validates
//! itself once at the facade boundary and invalid combinations surface as
//! `INVALID_OPTIONS`.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::checksum::ChecksumAlgorithm;
use crate::common::EntryType;
use crate::error::{ErrorCode, FulpackError, Operation};
use crate::guard::{DEFAULT_MAX_BYTES, DEFAULT_MAX_ENTRIES};

/// What to do when an extraction target already exists.
#[derive(Serialize, Deserialize, ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    /// Report a per-entry error and leave the existing file untouched.
    Error,
    /// Leave the existing file untouched and count the entry as skipped.
    Skip,
    /// Replace the existing file.
    Overwrite,
}

impl Default for OverwritePolicy {
    fn default() -> Self {
        OverwritePolicy::Error
    }
}

/// Options for `create`.
#[derive(Debug, Clone)]
pub struct CreateOptions {
    /// Gzip/deflate level, 1-9. Ignored for uncompressed TAR.
    pub compression_level: u32,
    /// Digest embedded per file where the format supports it; `None` skips
    /// digest computation entirely.
    pub checksum_algorithm: Option<ChecksumAlgorithm>,
    /// Record POSIX modes in the archive.
    pub preserve_permissions: bool,
    /// Archive the content a symlink points at instead of skipping the link.
    pub follow_symlinks: bool,
    /// Glob patterns an entry path must match to be included.
    pub include_patterns: Vec<String>,
    /// Glob patterns that exclude an entry path, applied before includes.
    pub exclude_patterns: Vec<String>,
    pub cancel: CancelToken,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            compression_level: 6,
            checksum_algorithm: Some(ChecksumAlgorithm::Sha256),
            preserve_permissions: true,
            follow_symlinks: false,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            cancel: CancelToken::new(),
        }
    }
}

impl CreateOptions {
    pub fn validate(&self) -> Result<(), FulpackError> {
        if !(1..=9).contains(&self.compression_level) {
            return Err(FulpackError::new(
                ErrorCode::InvalidOptions,
                Operation::Create,
                format!(
                    "compression_level must be between 1 and 9, got {}",
                    self.compression_level
                ),
            ));
        }
        validate_patterns(&self.include_patterns, Operation::Create)?;
        validate_patterns(&self.exclude_patterns, Operation::Create)?;
        Ok(())
    }
}

/// Options for `extract`.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub overwrite: OverwritePolicy,
    /// Recompute embedded digests while writing and report mismatches.
    pub verify_checksums: bool,
    /// Restore recorded POSIX modes.
    pub preserve_permissions: bool,
    /// Ceiling for cumulative extracted bytes.
    pub max_size: u64,
    /// Ceiling for entry count.
    pub max_entries: u64,
    /// Glob patterns an entry must match to be extracted.
    pub include_patterns: Vec<String>,
    pub cancel: CancelToken,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            overwrite: OverwritePolicy::default(),
            verify_checksums: true,
            preserve_permissions: true,
            max_size: DEFAULT_MAX_BYTES,
            max_entries: DEFAULT_MAX_ENTRIES,
            include_patterns: Vec::new(),
            cancel: CancelToken::new(),
        }
    }
}

impl ExtractOptions {
    pub fn validate(&self) -> Result<(), FulpackError> {
        if self.max_size == 0 || self.max_entries == 0 {
            return Err(FulpackError::new(
                ErrorCode::InvalidOptions,
                Operation::Extract,
                "max_size and max_entries must be non-zero",
            ));
        }
        validate_patterns(&self.include_patterns, Operation::Extract)?;
        Ok(())
    }
}

/// Options for `scan`.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Populate checksum/mode/symlink metadata; `false` keeps just path,
    /// type and size.
    pub include_metadata: bool,
    /// Restrict the listing to these entry types.
    pub entry_types: Option<Vec<EntryType>>,
    /// Drop entries nested deeper than this many path components.
    pub max_depth: Option<usize>,
    pub max_entries: u64,
    pub cancel: CancelToken,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            include_metadata: true,
            entry_types: None,
            max_depth: None,
            max_entries: DEFAULT_MAX_ENTRIES,
            cancel: CancelToken::new(),
        }
    }
}

impl ScanOptions {
    pub fn validate(&self) -> Result<(), FulpackError> {
        if self.max_entries == 0 {
            return Err(FulpackError::new(
                ErrorCode::InvalidOptions,
                Operation::Scan,
                "max_entries must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Options for `verify`.
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Recompute embedded digests; disable to check structure and paths only.
    pub verify_checksums: bool,
    pub max_entries: u64,
    pub cancel: CancelToken,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            verify_checksums: true,
            max_entries: DEFAULT_MAX_ENTRIES,
            cancel: CancelToken::new(),
        }
    }
}

fn validate_patterns(patterns: &[String], operation: Operation) -> Result<(), FulpackError> {
    for raw in patterns {
        if glob::Pattern::new(raw).is_err() {
            return Err(FulpackError::new(
                ErrorCode::InvalidOptions,
                operation,
                format!("invalid glob pattern '{raw}'"),
            ));
        }
    }
    Ok(())
}

/// Check if an entry path matches the filter patterns.
/// - If include patterns are specified, the path must match at least one
/// - If exclude patterns are specified, the path must not match any
pub fn matches_filters(path: &str, include: &[String], exclude: &[String]) -> bool {
    for raw in exclude {
        if let Ok(pattern) = glob::Pattern::new(raw) {
            if pattern.matches(path) {
                return false;
            }
        }
    }
    if include.is_empty() {
        return true;
    }
    for raw in include {
        if let Ok(pattern) = glob::Pattern::new(raw) {
            if pattern.matches(path) {
                return true;
            }
        }
    }
    false
}
