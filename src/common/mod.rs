//! Common value types shared across operations.
// One record type per archive member plus the aggregate result shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FulpackError;
use crate::formats::{Compression, Format};

/// The kind of an archive member.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Directory,
    Symlink,
}

/// Metadata for a single member of an archive.
///
/// `path` is a normalized relative path with forward slashes. Entries produced
/// by `extract` have passed the path safety validator; entries produced by
/// `scan` are listed as stored (inspection mode) and may still contain
/// traversal-shaped paths for `verify` to flag.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ArchiveEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// Uncompressed byte length; 0 for directories.
    pub size: u64,
    /// Stored byte length where the format tracks it (zip).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_size: Option<u64>,
    /// Member timestamp, or the capture time when the format lacks one.
    pub modified: DateTime<Utc>,
    /// Embedded digest in `<algo>:<hex>` form, if the archive carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// POSIX permission bits as an octal string, e.g. `"755"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Link target as stored; never dereferenced by this crate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symlink_target: Option<String>,
}

/// Aggregate metadata about one archive file.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ArchiveInfo {
    pub format: Format,
    pub compression: Compression,
    pub entry_count: u64,
    /// Sum of uncompressed entry sizes.
    pub total_size: u64,
    /// On-disk size of the archive file.
    pub compressed_size: u64,
    /// `total_size / compressed_size`; 1.0 when `total_size` is 0.
    pub compression_ratio: f64,
    pub has_checksums: bool,
    pub created: DateTime<Utc>,
}

/// Outcome counters for one `extract` call.
///
/// Per-entry failures are recorded here instead of failing the call; only a
/// resource-guard violation stops processing early, and even then the work
/// already done is reported rather than rolled back.
#[derive(Serialize, Debug, Clone, Default)]
pub struct ExtractResult {
    pub extracted_count: u64,
    pub skipped_count: u64,
    pub error_count: u64,
    pub errors: Vec<FulpackError>,
    pub warnings: Vec<String>,
}

impl ExtractResult {
    pub fn record_error(&mut self, err: FulpackError) {
        self.error_count += 1;
        self.errors.push(err);
    }
}

/// The security checks `verify` can run. A check appears in
/// `checks_performed` only when its precondition held for the archive.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValidationCheck {
    StructureValid,
    NoPathTraversal,
    SymlinksSafe,
    NoDecompressionBomb,
    ChecksumsVerified,
}

impl ValidationCheck {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationCheck::StructureValid => "structure_valid",
            ValidationCheck::NoPathTraversal => "no_path_traversal",
            ValidationCheck::SymlinksSafe => "symlinks_safe",
            ValidationCheck::NoDecompressionBomb => "no_decompression_bomb",
            ValidationCheck::ChecksumsVerified => "checksums_verified",
        }
    }
}

/// Outcome of one `verify` call.
#[derive(Serialize, Debug, Clone, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<FulpackError>,
    pub warnings: Vec<String>,
    pub entry_count: u64,
    /// Number of entries whose embedded checksum was recomputed and matched.
    pub checksums_verified: u64,
    /// Ordered list of the checks that actually ran.
    pub checks_performed: Vec<ValidationCheck>,
}
