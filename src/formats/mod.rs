//! Format codec adapters.
//!
//! One adapter per container format, all exposing the same two entry points:
//! [`write_archive`] streams prepared source entries into a new archive and
//! [`read_entries`] walks an existing archive, handing each member to a
//! visitor together with a readable content sub-stream. Dispatch is a closed
//! match over [`Format`]; no extension strings survive past detection.

pub mod gzip;
pub mod tar;
pub mod zip;

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::EntryType;
use crate::error::{FulpackError, Operation};
use crate::options::CreateOptions;

/// The closed set of supported container formats.
#[derive(Serialize, Deserialize, clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Tar,
    #[serde(rename = "tar.gz")]
    TarGz,
    Zip,
    Gzip,
}

/// Compression layer applied by a format.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    Gzip,
    Deflate,
}

impl Format {
    /// Detect a format from a filename suffix. `None` for unrecognized
    /// suffixes; the facade maps that to `INVALID_ARCHIVE_FORMAT`.
    pub fn from_path(path: &Path) -> Option<Format> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Format::TarGz)
        } else if name.ends_with(".tar") {
            Some(Format::Tar)
        } else if name.ends_with(".zip") {
            Some(Format::Zip)
        } else if name.ends_with(".gz") {
            Some(Format::Gzip)
        } else {
            None
        }
    }

    pub fn compression(&self) -> Compression {
        match self {
            Format::Tar => Compression::None,
            Format::TarGz | Format::Gzip => Compression::Gzip,
            Format::Zip => Compression::Deflate,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Tar => "tar",
            Format::TarGz => "tar.gz",
            Format::Zip => "zip",
            Format::Gzip => "gzip",
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One filesystem object queued for archiving, with its path already made
/// relative and slash-normalized by the source walker.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    pub abs_path: std::path::PathBuf,
    /// Forward-slash relative path stored in the archive.
    pub rel_path: String,
    pub entry_type: EntryType,
    pub size: u64,
    pub mode: Option<u32>,
    pub modified: DateTime<Utc>,
}

/// What an encode pass produced, before the facade stats the output file.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteSummary {
    pub entry_count: u64,
    pub total_size: u64,
    pub has_checksums: bool,
}

/// One decoded archive member, valid for the duration of a visitor call.
///
/// `reader` is a bounded sub-stream over the member's content; it is `None`
/// for directories and for symlinks (whose target is already resolved into
/// `symlink_target`). Content is never buffered whole by the adapter.
pub struct RawEntry<'a> {
    pub path: String,
    pub entry_type: EntryType,
    pub size: u64,
    pub compressed_size: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
    pub mode: Option<u32>,
    pub symlink_target: Option<String>,
    pub checksum: Option<String>,
    pub reader: Option<&'a mut dyn Read>,
}

/// Visitor verdict after each entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Open an archive file for decoding, mapping a missing file onto the
/// taxonomy instead of surfacing a raw I/O error.
pub(crate) fn open_archive(
    path: &Path,
    operation: Operation,
) -> Result<std::fs::File, FulpackError> {
    std::fs::File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            FulpackError::new(
                crate::error::ErrorCode::ArchiveNotFound,
                operation,
                format!("archive '{}' does not exist", path.display()),
            )
            .with_archive(path)
        } else {
            FulpackError::from_io(&e, operation, path)
        }
    })
}

/// Wrap a codec/read failure as `ARCHIVE_CORRUPT` with the archive attached.
pub(crate) fn corrupt_error(
    operation: Operation,
    archive: &Path,
    err: &dyn std::fmt::Display,
) -> FulpackError {
    FulpackError::new(
        crate::error::ErrorCode::ArchiveCorrupt,
        operation,
        err.to_string(),
    )
    .with_archive(archive)
}

/// Error returned when a caller's `CancelToken` fires mid-operation.
pub(crate) fn cancelled_error(operation: Operation) -> FulpackError {
    FulpackError::new(
        crate::error::ErrorCode::ExtractionFailed,
        operation,
        "operation cancelled by caller",
    )
}

/// Stream prepared sources into a new archive at `output`.
pub fn write_archive(
    format: Format,
    sources: &[SourceEntry],
    output: &Path,
    options: &CreateOptions,
) -> Result<WriteSummary, FulpackError> {
    match format {
        Format::Tar => tar::write_plain(sources, output, options),
        Format::TarGz => tar::write_gzip(sources, output, options),
        Format::Zip => zip::write(sources, output, options),
        Format::Gzip => gzip::write_single(sources, output, options),
    }
}

/// Walk every member of the archive, in stored order, invoking `visit` once
/// per entry. The walk stops early when the visitor returns [`Flow::Stop`]
/// or an error; visitor errors propagate unchanged.
pub fn read_entries(
    format: Format,
    archive: &Path,
    operation: Operation,
    visit: &mut dyn FnMut(RawEntry<'_>) -> Result<Flow, FulpackError>,
) -> Result<(), FulpackError> {
    match format {
        Format::Tar => tar::read_plain(archive, operation, visit),
        Format::TarGz => tar::read_gzip(archive, operation, visit),
        Format::Zip => zip::read(archive, operation, visit),
        Format::Gzip => gzip::read_single(archive, operation, visit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_detection_covers_all_formats() {
        assert_eq!(Format::from_path(Path::new("a.tar")), Some(Format::Tar));
        assert_eq!(Format::from_path(Path::new("a.tar.gz")), Some(Format::TarGz));
        assert_eq!(Format::from_path(Path::new("a.tgz")), Some(Format::TarGz));
        assert_eq!(Format::from_path(Path::new("a.zip")), Some(Format::Zip));
        assert_eq!(Format::from_path(Path::new("a.gz")), Some(Format::Gzip));
        assert_eq!(Format::from_path(Path::new("A.TAR.GZ")), Some(Format::TarGz));
        assert_eq!(Format::from_path(Path::new("a.rar")), None);
        assert_eq!(Format::from_path(Path::new("archive")), None);
    }

    #[test]
    fn tar_gz_wins_over_bare_gz() {
        assert_eq!(Format::from_path(Path::new("x.tar.gz")), Some(Format::TarGz));
        assert_eq!(Format::from_path(Path::new("x.txt.gz")), Some(Format::Gzip));
    }

    #[test]
    fn compression_layer_per_format() {
        assert_eq!(Format::Tar.compression(), Compression::None);
        assert_eq!(Format::TarGz.compression(), Compression::Gzip);
        assert_eq!(Format::Zip.compression(), Compression::Deflate);
        assert_eq!(Format::Gzip.compression(), Compression::Gzip);
    }
}
