use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Stable error codes shared by every operation in the crate.
///
/// These are part of the public contract: callers match on the code, not on
/// the message text, so variants are never renamed or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidArchiveFormat,
    InvalidPath,
    InvalidOptions,
    PathTraversal,
    AbsolutePath,
    SymlinkEscape,
    DecompressionBomb,
    ChecksumMismatch,
    ArchiveNotFound,
    ArchiveCorrupt,
    ExtractionFailed,
    PermissionDenied,
    DiskFull,
    SourceNotFound,
}

impl ErrorCode {
    /// The stable string form, e.g. `PATH_TRAVERSAL`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArchiveFormat => "INVALID_ARCHIVE_FORMAT",
            ErrorCode::InvalidPath => "INVALID_PATH",
            ErrorCode::InvalidOptions => "INVALID_OPTIONS",
            ErrorCode::PathTraversal => "PATH_TRAVERSAL",
            ErrorCode::AbsolutePath => "ABSOLUTE_PATH",
            ErrorCode::SymlinkEscape => "SYMLINK_ESCAPE",
            ErrorCode::DecompressionBomb => "DECOMPRESSION_BOMB",
            ErrorCode::ChecksumMismatch => "CHECKSUM_MISMATCH",
            ErrorCode::ArchiveNotFound => "ARCHIVE_NOT_FOUND",
            ErrorCode::ArchiveCorrupt => "ARCHIVE_CORRUPT",
            ErrorCode::ExtractionFailed => "EXTRACTION_FAILED",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::DiskFull => "DISK_FULL",
            ErrorCode::SourceNotFound => "SOURCE_NOT_FOUND",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The operation an error was raised by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Extract,
    Scan,
    Verify,
    Info,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Extract => "extract",
            Operation::Scan => "scan",
            Operation::Verify => "verify",
            Operation::Info => "info",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single error shape used throughout the crate.
///
/// Low-level I/O and codec errors are always wrapped into this type with the
/// originating operation attached; callers never see a raw `io::Error`.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{operation}: {code}: {message}")]
pub struct FulpackError {
    /// Stable machine-readable code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// The operation that produced the error.
    pub operation: Operation,
    /// The entry or filesystem path involved, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// The archive file involved, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<PathBuf>,
    /// Free-form diagnostic context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Map<String, serde_json::Value>>,
}

impl FulpackError {
    pub fn new(code: ErrorCode, operation: Operation, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            operation,
            path: None,
            archive: None,
            details: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_archive(mut self, archive: impl Into<PathBuf>) -> Self {
        self.archive = Some(archive.into());
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details
            .get_or_insert_with(serde_json::Map::new)
            .insert(key.to_string(), value.into());
        self
    }

    /// Wrap an I/O error, classifying the few kinds callers care about.
    pub fn from_io(err: &io::Error, operation: Operation, path: &Path) -> Self {
        let code = classify_io(err);
        Self::new(code, operation, err.to_string()).with_path(path)
    }
}

/// Map an `io::Error` onto the stable taxonomy.
fn classify_io(err: &io::Error) -> ErrorCode {
    if err.kind() == io::ErrorKind::PermissionDenied {
        return ErrorCode::PermissionDenied;
    }
    if err.kind() == io::ErrorKind::NotFound {
        return ErrorCode::SourceNotFound;
    }
    #[cfg(unix)]
    if err.raw_os_error() == Some(libc::ENOSPC) {
        return ErrorCode::DiskFull;
    }
    ErrorCode::ExtractionFailed
}
