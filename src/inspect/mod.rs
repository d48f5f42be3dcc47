//! # Read-only Operations
//!
//! `scan` enumerates archive members without writing to disk, `info`
//! aggregates a scan into archive-level metadata, and `verify` layers the
//! security checks on top: path validation over every entry, symlink target
//! safety, compression-ratio heuristics and optional checksum recomputation.
//!
//! `scan` is deliberately an inspection mode: traversal-shaped paths are
//! listed (and logged) rather than rejected, so `verify` can flag them.

use std::fs;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::checksum::Hasher;
use crate::common::{
    ArchiveEntry, ArchiveInfo, EntryType, ValidationCheck, ValidationResult,
};
use crate::error::{ErrorCode, FulpackError, Operation};
use crate::formats::{self, Flow, Format, RawEntry};
use crate::guard::{compression_ratio, ratio_warning, ResourceGuard, DEFAULT_MAX_BYTES};
use crate::options::{ScanOptions, VerifyOptions};
use crate::safety::{symlink_target_escapes, validate_entry_path};

/// List every member of an archive without extracting anything.
///
/// The entry-count ceiling is enforced fatally: an unbounded listing is
/// itself a resource risk.
pub async fn scan(archive: &Path, options: ScanOptions) -> Result<Vec<ArchiveEntry>, FulpackError> {
    let archive = archive.to_path_buf();
    tokio::task::spawn_blocking(move || scan_sync(&archive, &options))
        .await
        .map_err(|e| {
            FulpackError::new(
                ErrorCode::ExtractionFailed,
                Operation::Scan,
                format!("scan task failed: {e}"),
            )
        })?
}

/// Blocking core of [`scan`].
pub fn scan_sync(archive: &Path, options: &ScanOptions) -> Result<Vec<ArchiveEntry>, FulpackError> {
    options.validate()?;
    scan_inner(archive, options, Operation::Scan)
}

fn scan_inner(
    archive: &Path,
    options: &ScanOptions,
    operation: Operation,
) -> Result<Vec<ArchiveEntry>, FulpackError> {
    let format = detect_format(archive, operation)?;
    let mut guard = ResourceGuard::new(u64::MAX, options.max_entries, operation);
    let mut entries = Vec::new();
    let mut fatal: Option<FulpackError> = None;

    formats::read_entries(format, archive, operation, &mut |raw| {
        if options.cancel.is_cancelled() {
            return Ok(Flow::Stop);
        }
        if let Err(err) = guard.charge_entry() {
            fatal = Some(err);
            return Ok(Flow::Stop);
        }
        if let Some(entry) = to_entry(&raw, options, operation) {
            entries.push(entry);
        }
        Ok(Flow::Continue)
    })?;

    if let Some(err) = fatal {
        return Err(err.with_archive(archive));
    }
    debug!(archive = %archive.display(), entries = entries.len(), "scan complete");
    Ok(entries)
}

/// Convert one decoded member into the public entry shape, applying the
/// scan filters. Returns `None` for filtered-out entries.
fn to_entry(raw: &RawEntry<'_>, options: &ScanOptions, operation: Operation) -> Option<ArchiveEntry> {
    let path = crate::safety::normalize_entry_path(&raw.path);

    if let Some(max_depth) = options.max_depth {
        if path.split('/').count() > max_depth {
            return None;
        }
    }
    if let Some(types) = &options.entry_types {
        if !types.contains(&raw.entry_type) {
            return None;
        }
    }

    // Inspection mode: suspicious paths are listed, not dropped.
    if validate_entry_path(&raw.path, true, operation).is_some() {
        warn!(path = %raw.path, "listing entry with traversal-shaped path");
    }

    let (checksum, mode, symlink_target) = if options.include_metadata {
        (
            raw.checksum.clone(),
            raw.mode.map(|m| format!("{m:o}")),
            raw.symlink_target.clone(),
        )
    } else {
        (None, None, None)
    };

    Some(ArchiveEntry {
        path,
        entry_type: raw.entry_type,
        size: raw.size,
        compressed_size: raw.compressed_size,
        modified: raw.modified.unwrap_or_else(Utc::now),
        checksum,
        mode,
        symlink_target,
    })
}

/// Aggregate archive metadata without security checks; the fast path.
/// Callers needing safety guarantees use `verify`.
pub async fn info(archive: &Path) -> Result<ArchiveInfo, FulpackError> {
    let archive = archive.to_path_buf();
    tokio::task::spawn_blocking(move || info_sync(&archive))
        .await
        .map_err(|e| {
            FulpackError::new(
                ErrorCode::ExtractionFailed,
                Operation::Info,
                format!("info task failed: {e}"),
            )
        })?
}

/// Blocking core of [`info`].
pub fn info_sync(archive: &Path) -> Result<ArchiveInfo, FulpackError> {
    let format = detect_format(archive, Operation::Info)?;
    let entries = scan_inner(archive, &ScanOptions::default(), Operation::Info)?;

    let metadata = fs::metadata(archive)
        .map_err(|e| FulpackError::from_io(&e, Operation::Info, archive))?;
    let total_size: u64 = entries.iter().map(|e| e.size).sum();
    let compressed_size = metadata.len();

    Ok(ArchiveInfo {
        format,
        compression: format.compression(),
        entry_count: entries.len() as u64,
        total_size,
        compressed_size,
        compression_ratio: compression_ratio(total_size, compressed_size),
        has_checksums: entries.iter().any(|e| e.checksum.is_some()),
        created: created_of(&metadata),
    })
}

/// Run the full security check suite over an archive.
///
/// Preconditions (missing archive, unknown suffix) fail the call; everything
/// found past that point is reported through the [`ValidationResult`].
pub async fn verify(archive: &Path, options: VerifyOptions) -> Result<ValidationResult, FulpackError> {
    let archive = archive.to_path_buf();
    tokio::task::spawn_blocking(move || verify_sync(&archive, &options))
        .await
        .map_err(|e| {
            FulpackError::new(
                ErrorCode::ExtractionFailed,
                Operation::Verify,
                format!("verify task failed: {e}"),
            )
        })?
}

/// Blocking core of [`verify`].
pub fn verify_sync(
    archive: &Path,
    options: &VerifyOptions,
) -> Result<ValidationResult, FulpackError> {
    detect_format(archive, Operation::Verify)?;

    let mut result = ValidationResult::default();
    result.checks_performed.push(ValidationCheck::StructureValid);

    let scan_options = ScanOptions {
        max_entries: options.max_entries,
        cancel: options.cancel.clone(),
        ..Default::default()
    };
    let entries = match scan_inner(archive, &scan_options, Operation::Verify) {
        Ok(entries) => entries,
        // Structural damage and entry-ceiling hits are findings, not
        // precondition failures.
        Err(err)
            if matches!(
                err.code,
                ErrorCode::ArchiveCorrupt | ErrorCode::DecompressionBomb
            ) =>
        {
            result.errors.push(err);
            result.valid = false;
            return Ok(result);
        }
        Err(err) => return Err(err),
    };
    result.entry_count = entries.len() as u64;

    result.checks_performed.push(ValidationCheck::NoPathTraversal);
    for entry in &entries {
        if let Some(err) = validate_entry_path(&entry.path, true, Operation::Verify) {
            result.errors.push(err.with_archive(archive));
        }
    }

    let has_symlinks = entries
        .iter()
        .any(|e| e.entry_type == EntryType::Symlink);
    if has_symlinks {
        result.checks_performed.push(ValidationCheck::SymlinksSafe);
        for entry in entries.iter().filter(|e| e.entry_type == EntryType::Symlink) {
            match entry.symlink_target.as_deref() {
                Some(target) if symlink_target_escapes(&entry.path, target) => {
                    result.errors.push(
                        FulpackError::new(
                            ErrorCode::SymlinkEscape,
                            Operation::Verify,
                            format!(
                                "symlink '{}' targets '{}' outside the archive root",
                                entry.path, target
                            ),
                        )
                        .with_path(&entry.path)
                        .with_archive(archive),
                    );
                }
                Some(_) => {}
                None => result
                    .warnings
                    .push(format!("symlink '{}' has no recorded target", entry.path)),
            }
        }
    }

    result
        .checks_performed
        .push(ValidationCheck::NoDecompressionBomb);
    let total_size: u64 = entries.iter().map(|e| e.size).sum();
    let compressed_size = fs::metadata(archive)
        .map_err(|e| FulpackError::from_io(&e, Operation::Verify, archive))?
        .len();
    if let Some(warning) = ratio_warning(total_size, compressed_size) {
        result.warnings.push(warning);
    }

    let has_checksums = entries.iter().any(|e| e.checksum.is_some());
    if has_checksums && options.verify_checksums {
        result
            .checks_performed
            .push(ValidationCheck::ChecksumsVerified);
        verify_checksums(archive, options, &mut result)?;
    }

    result.valid = result.errors.is_empty();
    Ok(result)
}

/// Second pass over the archive re-hashing entry content against embedded
/// digests. Streams through a byte-ceiling guard so a bomb cannot hide
/// behind the checksum walk either.
fn verify_checksums(
    archive: &Path,
    options: &VerifyOptions,
    result: &mut ValidationResult,
) -> Result<(), FulpackError> {
    let format = detect_format(archive, Operation::Verify)?;
    let mut guard = ResourceGuard::new(DEFAULT_MAX_BYTES, options.max_entries, Operation::Verify);
    let mut verified = 0u64;
    let mut findings: Vec<FulpackError> = Vec::new();

    let walked = formats::read_entries(format, archive, Operation::Verify, &mut |raw| {
        if options.cancel.is_cancelled() {
            return Ok(Flow::Stop);
        }
        let (Some(expected), Some(reader)) = (raw.checksum.as_deref(), raw.reader) else {
            return Ok(Flow::Continue);
        };
        let Some(mut hasher) = Hasher::for_digest(expected) else {
            return Ok(Flow::Continue);
        };

        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf).map_err(|e| {
                FulpackError::new(ErrorCode::ArchiveCorrupt, Operation::Verify, e.to_string())
                    .with_archive(archive)
            })?;
            if n == 0 {
                break;
            }
            guard.charge_bytes(n as u64)?;
            hasher.update(&buf[..n]);
        }

        let actual = hasher.finish();
        if actual == expected {
            verified += 1;
        } else {
            findings.push(
                FulpackError::new(
                    ErrorCode::ChecksumMismatch,
                    Operation::Verify,
                    format!("checksum mismatch for '{}'", raw.path),
                )
                .with_path(&raw.path)
                .with_archive(archive)
                .with_detail("expected", expected)
                .with_detail("actual", actual),
            );
        }
        Ok(Flow::Continue)
    });
    match walked {
        Ok(()) => {}
        // A bomb tripping the hash walk is a finding rather than a crash.
        Err(err) if ResourceGuard::is_violation(&err) => findings.push(err),
        Err(err) => return Err(err),
    }

    result.checksums_verified = verified;
    result.errors.extend(findings);
    Ok(())
}

fn detect_format(archive: &Path, operation: Operation) -> Result<Format, FulpackError> {
    if !archive.exists() {
        return Err(FulpackError::new(
            ErrorCode::ArchiveNotFound,
            operation,
            format!("archive '{}' does not exist", archive.display()),
        )
        .with_archive(archive));
    }
    Format::from_path(archive).ok_or_else(|| {
        FulpackError::new(
            ErrorCode::InvalidArchiveFormat,
            operation,
            format!("unrecognized archive suffix on '{}'", archive.display()),
        )
        .with_archive(archive)
    })
}

fn created_of(metadata: &fs::Metadata) -> DateTime<Utc> {
    metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}
