//! # Archive Creation
//!
//! This module implements the `create` operation. It orchestrates the whole
//! process: discovering source files, applying glob filters and the symlink
//! policy, streaming the tree through the selected format adapter and
//! assembling the resulting [`ArchiveInfo`].

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::common::{ArchiveInfo, EntryType};
use crate::error::{ErrorCode, FulpackError, Operation};
use crate::formats::{self, Format, SourceEntry};
use crate::fsx;
use crate::guard::compression_ratio;
use crate::options::{matches_filters, CreateOptions};

/// Create an archive at `output` from one or more source paths.
///
/// Runs as a cancellable unit of work; the streaming core executes on the
/// blocking pool. Terminal failures are `SOURCE_NOT_FOUND`,
/// `INVALID_OPTIONS` and I/O errors wrapped with create context.
pub async fn create(
    inputs: &[PathBuf],
    output: &Path,
    format: Format,
    options: CreateOptions,
) -> Result<ArchiveInfo, FulpackError> {
    let inputs = inputs.to_vec();
    let output = output.to_path_buf();
    tokio::task::spawn_blocking(move || create_sync(&inputs, &output, format, &options))
        .await
        .map_err(|e| {
            FulpackError::new(
                ErrorCode::ExtractionFailed,
                Operation::Create,
                format!("create task failed: {e}"),
            )
        })?
}

/// Blocking core of [`create`].
pub fn create_sync(
    inputs: &[PathBuf],
    output: &Path,
    format: Format,
    options: &CreateOptions,
) -> Result<ArchiveInfo, FulpackError> {
    options.validate()?;
    if inputs.is_empty() {
        return Err(FulpackError::new(
            ErrorCode::InvalidOptions,
            Operation::Create,
            "at least one source path is required",
        ));
    }
    for input in inputs {
        if !input.exists() {
            return Err(FulpackError::new(
                ErrorCode::SourceNotFound,
                Operation::Create,
                format!("source '{}' does not exist", input.display()),
            )
            .with_path(input));
        }
    }

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .map_err(|e| FulpackError::from_io(&e, Operation::Create, parent))?;
        }
    }

    let sources = collect_sources(inputs, options)?;
    debug!(
        format = %format,
        sources = sources.len(),
        output = %output.display(),
        "creating archive"
    );

    let summary = formats::write_archive(format, &sources, output, options)?;

    let archive_size = fs::metadata(output)
        .map_err(|e| FulpackError::from_io(&e, Operation::Create, output))?
        .len();

    Ok(ArchiveInfo {
        format,
        compression: format.compression(),
        entry_count: summary.entry_count,
        total_size: summary.total_size,
        compressed_size: archive_size,
        compression_ratio: compression_ratio(summary.total_size, archive_size),
        has_checksums: summary.has_checksums,
        created: Utc::now(),
    })
}

/// Walk the input paths into a flat, deterministic source list.
///
/// Directories are walked in name order and always precede their children.
/// Symlinks are skipped (with a warning) unless `follow_symlinks` is set, in
/// which case the target's content is archived; link semantics are not
/// preserved either way.
pub fn collect_sources(
    inputs: &[PathBuf],
    options: &CreateOptions,
) -> Result<Vec<SourceEntry>, FulpackError> {
    let mut sources = Vec::new();

    for input in inputs {
        if input.is_dir() {
            collect_tree(input, options, &mut sources)?;
        } else {
            let metadata = fs::symlink_metadata(input)
                .map_err(|e| FulpackError::from_io(&e, Operation::Create, input))?;
            if metadata.file_type().is_symlink() && !options.follow_symlinks {
                warn!(path = %input.display(), "skipping symlink source");
                continue;
            }
            let rel_path = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    FulpackError::new(
                        ErrorCode::InvalidPath,
                        Operation::Create,
                        format!("source '{}' has no file name", input.display()),
                    )
                    .with_path(input)
                })?;
            if !matches_filters(&rel_path, &options.include_patterns, &options.exclude_patterns) {
                continue;
            }
            let metadata = fs::metadata(input)
                .map_err(|e| FulpackError::from_io(&e, Operation::Create, input))?;
            sources.push(SourceEntry {
                abs_path: input.clone(),
                rel_path,
                entry_type: EntryType::File,
                size: metadata.len(),
                mode: fsx::unix_mode(&metadata),
                modified: modified_of(&metadata),
            });
        }
    }

    Ok(sources)
}

fn collect_tree(
    root: &Path,
    options: &CreateOptions,
    sources: &mut Vec<SourceEntry>,
) -> Result<(), FulpackError> {
    let walker = WalkDir::new(root)
        .follow_links(options.follow_symlinks)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| {
            FulpackError::new(
                ErrorCode::SourceNotFound,
                Operation::Create,
                e.to_string(),
            )
            .with_path(root)
        })?;

        if entry.file_type().is_symlink() {
            // Only reachable with follow_links off; the security default.
            warn!(path = %entry.path().display(), "skipping symlink during creation");
            continue;
        }

        let rel = match entry.path().strip_prefix(root) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => continue, // the root directory itself
        };
        let rel_path = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if !matches_filters(&rel_path, &options.include_patterns, &options.exclude_patterns) {
            continue;
        }

        let metadata = entry
            .metadata()
            .map_err(|e| {
                FulpackError::new(ErrorCode::SourceNotFound, Operation::Create, e.to_string())
                    .with_path(entry.path())
            })?;

        let entry_type = if metadata.is_dir() {
            EntryType::Directory
        } else {
            EntryType::File
        };
        sources.push(SourceEntry {
            abs_path: entry.path().to_path_buf(),
            rel_path,
            entry_type,
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            mode: fsx::unix_mode(&metadata),
            modified: modified_of(&metadata),
        });
    }

    Ok(())
}

fn modified_of(metadata: &fs::Metadata) -> DateTime<Utc> {
    metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}
