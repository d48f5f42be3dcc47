//! # Extraction Module
//!
//! Streaming extraction with security enforcement. Every decoded entry runs
//! through the path safety validator before any bytes touch disk, and the
//! per-operation [`ResourceGuard`] is charged between read chunks so a
//! decompression bomb aborts mid-stream with the partial file removed.
//! Per-entry failures are collected into the [`ExtractResult`]; only guard
//! violations stop the remaining entries.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::checksum::Hasher;
use crate::common::{EntryType, ExtractResult};
use crate::error::{ErrorCode, FulpackError, Operation};
use crate::formats::{self, Flow, Format, RawEntry};
use crate::fsx;
use crate::guard::ResourceGuard;
use crate::options::{matches_filters, ExtractOptions, OverwritePolicy};
use crate::safety::{join_under, validate_entry_path};

const COPY_BUF_LEN: usize = 64 * 1024;

/// Extract an archive into `destination`, creating it if missing.
///
/// Never fails for per-entry problems; those are reported through the
/// returned [`ExtractResult`]. Structural problems (missing archive,
/// unrecognized suffix, corrupt container) fail the call.
pub async fn extract(
    archive: &Path,
    destination: &Path,
    options: ExtractOptions,
) -> Result<ExtractResult, FulpackError> {
    let archive = archive.to_path_buf();
    let destination = destination.to_path_buf();
    tokio::task::spawn_blocking(move || extract_sync(&archive, &destination, &options))
        .await
        .map_err(|e| {
            FulpackError::new(
                ErrorCode::ExtractionFailed,
                Operation::Extract,
                format!("extract task failed: {e}"),
            )
        })?
}

/// Blocking core of [`extract`].
pub fn extract_sync(
    archive: &Path,
    destination: &Path,
    options: &ExtractOptions,
) -> Result<ExtractResult, FulpackError> {
    options.validate()?;

    if !archive.exists() {
        return Err(FulpackError::new(
            ErrorCode::ArchiveNotFound,
            Operation::Extract,
            format!("archive '{}' does not exist", archive.display()),
        )
        .with_archive(archive));
    }
    let format = Format::from_path(archive).ok_or_else(|| {
        FulpackError::new(
            ErrorCode::InvalidArchiveFormat,
            Operation::Extract,
            format!("unrecognized archive suffix on '{}'", archive.display()),
        )
        .with_archive(archive)
    })?;

    fs::create_dir_all(destination)
        .map_err(|e| FulpackError::from_io(&e, Operation::Extract, destination))?;

    debug!(archive = %archive.display(), %format, "extracting archive");

    let mut guard = ResourceGuard::new(options.max_size, options.max_entries, Operation::Extract);
    let mut result = ExtractResult::default();

    formats::read_entries(format, archive, Operation::Extract, &mut |raw| {
        process_entry(raw, destination, options, &mut guard, &mut result)
    })?;

    debug!(
        extracted = result.extracted_count,
        skipped = result.skipped_count,
        errors = result.error_count,
        "extraction finished"
    );
    Ok(result)
}

fn process_entry(
    raw: RawEntry<'_>,
    destination: &Path,
    options: &ExtractOptions,
    guard: &mut ResourceGuard,
    result: &mut ExtractResult,
) -> Result<Flow, FulpackError> {
    if options.cancel.is_cancelled() {
        result
            .warnings
            .push("extraction cancelled; remaining entries were not processed".to_string());
        return Ok(Flow::Stop);
    }

    if let Err(err) = guard.charge_entry() {
        result.record_error(err);
        return Ok(Flow::Stop);
    }

    // Entries outside the requested set are counted but never materialized.
    if !matches_filters(&raw.path, &options.include_patterns, &[]) {
        result.skipped_count += 1;
        return Ok(Flow::Continue);
    }

    if let Some(err) = validate_entry_path(&raw.path, false, Operation::Extract) {
        warn!(path = %raw.path, code = %err.code, "rejecting unsafe entry path");
        result.record_error(err);
        return Ok(Flow::Continue);
    }

    if let Err(err) = guard.check_claim(raw.size) {
        result.record_error(err);
        return Ok(Flow::Stop);
    }

    let target = join_under(destination, &raw.path);

    match raw.entry_type {
        EntryType::Directory => {
            if let Err(e) = fs::create_dir_all(&target) {
                result.record_error(FulpackError::from_io(&e, Operation::Extract, &target));
                return Ok(Flow::Continue);
            }
            apply_mode(&target, raw.mode, options, result);
            result.extracted_count += 1;
        }
        EntryType::Symlink => {
            // Symlink entries are never materialized; security default.
            result.skipped_count += 1;
            result.warnings.push(format!(
                "symlink entry '{}' not materialized (target '{}')",
                raw.path,
                raw.symlink_target.as_deref().unwrap_or("?")
            ));
        }
        EntryType::File => {
            return write_file_entry(raw, &target, options, guard, result);
        }
    }

    Ok(Flow::Continue)
}

fn write_file_entry(
    raw: RawEntry<'_>,
    target: &Path,
    options: &ExtractOptions,
    guard: &mut ResourceGuard,
    result: &mut ExtractResult,
) -> Result<Flow, FulpackError> {
    if target.exists() {
        match options.overwrite {
            OverwritePolicy::Error => {
                result.record_error(
                    FulpackError::new(
                        ErrorCode::ExtractionFailed,
                        Operation::Extract,
                        format!("destination '{}' already exists", target.display()),
                    )
                    .with_path(target),
                );
                return Ok(Flow::Continue);
            }
            OverwritePolicy::Skip => {
                result.skipped_count += 1;
                return Ok(Flow::Continue);
            }
            OverwritePolicy::Overwrite => {}
        }
    }

    if let Some(parent) = target.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            result.record_error(FulpackError::from_io(&e, Operation::Extract, parent));
            return Ok(Flow::Continue);
        }
    }

    let Some(reader) = raw.reader else {
        result.record_error(
            FulpackError::new(
                ErrorCode::ArchiveCorrupt,
                Operation::Extract,
                format!("file entry '{}' has no content stream", raw.path),
            )
            .with_path(&raw.path),
        );
        return Ok(Flow::Continue);
    };

    let mut hasher = if options.verify_checksums {
        raw.checksum.as_deref().and_then(Hasher::for_digest)
    } else {
        None
    };

    let mut output = match File::create(target) {
        Ok(f) => f,
        Err(e) => {
            result.record_error(FulpackError::from_io(&e, Operation::Extract, target));
            return Ok(Flow::Continue);
        }
    };

    match copy_guarded(reader, &mut output, target, guard, &mut hasher, &options.cancel) {
        Ok(CopyEnd::Complete(_written)) => {}
        Ok(CopyEnd::Cancelled) => {
            drop(output);
            remove_partial(target);
            result
                .warnings
                .push("extraction cancelled; remaining entries were not processed".to_string());
            return Ok(Flow::Stop);
        }
        Err(err) => {
            drop(output);
            remove_partial(target);
            let fatal = ResourceGuard::is_violation(&err);
            result.record_error(err.with_path(&raw.path));
            return Ok(if fatal { Flow::Stop } else { Flow::Continue });
        }
    }

    if let (Some(hasher), Some(expected)) = (hasher.take(), raw.checksum.as_deref()) {
        let actual = hasher.finish();
        if actual != expected {
            result.record_error(
                FulpackError::new(
                    ErrorCode::ChecksumMismatch,
                    Operation::Extract,
                    format!("checksum mismatch for '{}'", raw.path),
                )
                .with_path(&raw.path)
                .with_detail("expected", expected)
                .with_detail("actual", actual),
            );
            return Ok(Flow::Continue);
        }
    }

    apply_mode(target, raw.mode, options, result);
    result.extracted_count += 1;
    Ok(Flow::Continue)
}

enum CopyEnd {
    Complete(u64),
    Cancelled,
}

/// Chunked copy with the guard charged between reads. This is the stage that
/// makes mid-stream abort possible: a bomb trips the byte ceiling while
/// inflating, not after the entry has fully landed.
fn copy_guarded(
    reader: &mut dyn Read,
    output: &mut File,
    target: &Path,
    guard: &mut ResourceGuard,
    hasher: &mut Option<Hasher>,
    cancel: &CancelToken,
) -> Result<CopyEnd, FulpackError> {
    let mut buf = [0u8; COPY_BUF_LEN];
    let mut written = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Ok(CopyEnd::Cancelled);
        }
        let n = reader
            .read(&mut buf)
            .map_err(|e| wrap_read_error(&e))?;
        if n == 0 {
            break;
        }
        guard.charge_bytes(n as u64)?;
        if let Some(h) = hasher.as_mut() {
            h.update(&buf[..n]);
        }
        output
            .write_all(&buf[..n])
            .map_err(|e| FulpackError::from_io(&e, Operation::Extract, target))?;
        written += n as u64;
    }
    Ok(CopyEnd::Complete(written))
}

/// Decode-side read failures mean the container is damaged, not the target.
fn wrap_read_error(err: &std::io::Error) -> FulpackError {
    FulpackError::new(ErrorCode::ArchiveCorrupt, Operation::Extract, err.to_string())
}

fn remove_partial(target: &Path) {
    if fs::remove_file(target).is_err() {
        warn!(path = %target.display(), "failed to remove partially written file");
    }
}

fn apply_mode(
    target: &Path,
    mode: Option<u32>,
    options: &ExtractOptions,
    result: &mut ExtractResult,
) {
    if !options.preserve_permissions {
        return;
    }
    let Some(mode) = mode else { return };
    if let Err(e) = fsx::set_unix_permissions(target, mode) {
        result.warnings.push(format!(
            "could not restore mode {:o} on '{}': {}",
            mode,
            target.display(),
            e
        ));
    }
}
