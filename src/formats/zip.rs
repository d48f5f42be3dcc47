//! ZIP adapter.
//!
//! Create and extract are sequential streams even though the container
//! supports random access. Directory entries keep the trailing separator in
//! their stored name per ZIP convention, POSIX modes ride in the external
//! attributes on a best-effort basis, and every file entry carries the
//! container's CRC-32.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use zip::write::FileOptions;

use crate::common::EntryType;
use crate::error::{FulpackError, Operation};
use crate::options::CreateOptions;

use super::{cancelled_error, corrupt_error, open_archive, Flow, RawEntry, SourceEntry, WriteSummary};

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// Largest symlink target the reader will buffer when resolving link
/// entries; anything longer is left unresolved.
const MAX_SYMLINK_TARGET: u64 = 4096;

pub fn write(
    sources: &[SourceEntry],
    output: &Path,
    options: &CreateOptions,
) -> Result<WriteSummary, FulpackError> {
    let file = File::create(output)
        .map_err(|e| FulpackError::from_io(&e, Operation::Create, output))?;
    let mut writer = zip::ZipWriter::new(file);
    let mut summary = WriteSummary::default();

    for src in sources {
        if options.cancel.is_cancelled() {
            return Err(cancelled_error(Operation::Create));
        }

        let mut file_options = FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .compression_level(Some(options.compression_level as i32))
            .last_modified_time(to_zip_datetime(src.modified));
        if options.preserve_permissions {
            if let Some(mode) = src.mode {
                file_options = file_options.unix_permissions(mode);
            }
        }

        match src.entry_type {
            EntryType::Directory => {
                writer
                    .add_directory(src.rel_path.as_str(), file_options)
                    .map_err(|e| zip_write_error(e, &src.abs_path))?;
            }
            EntryType::File => {
                writer
                    .start_file(src.rel_path.as_str(), file_options)
                    .map_err(|e| zip_write_error(e, &src.abs_path))?;
                let mut input = File::open(&src.abs_path)
                    .map_err(|e| FulpackError::from_io(&e, Operation::Create, &src.abs_path))?;
                io::copy(&mut input, &mut writer)
                    .map_err(|e| FulpackError::from_io(&e, Operation::Create, &src.abs_path))?;
                summary.total_size += src.size;
            }
            EntryType::Symlink => continue,
        }

        summary.entry_count += 1;
    }

    writer
        .finish()
        .map_err(|e| zip_write_error(e, output))?;
    // The container stores a CRC-32 for every file entry.
    summary.has_checksums = true;
    Ok(summary)
}

pub fn read(
    archive: &Path,
    operation: Operation,
    visit: &mut dyn FnMut(RawEntry<'_>) -> Result<Flow, FulpackError>,
) -> Result<(), FulpackError> {
    let file = open_archive(archive, operation)?;
    let mut zip_archive =
        zip::ZipArchive::new(file).map_err(|e| corrupt_error(operation, archive, &e))?;

    for index in 0..zip_archive.len() {
        let mut entry = zip_archive
            .by_index(index)
            .map_err(|e| corrupt_error(operation, archive, &e))?;

        // `name()` is the stored name, unsanitized, so inspection sees
        // traversal-shaped paths exactly as the archive carries them.
        let path = entry.name().to_string();
        let mode = entry.unix_mode();
        let entry_type = if entry.is_dir() {
            EntryType::Directory
        } else if mode.is_some_and(|m| m & S_IFMT == S_IFLNK) {
            EntryType::Symlink
        } else {
            EntryType::File
        };
        let size = entry.size();
        let compressed_size = Some(entry.compressed_size());
        let modified = from_zip_datetime(entry.last_modified());
        let checksum = match entry_type {
            EntryType::File => Some(format!("crc32:{:08x}", entry.crc32())),
            _ => None,
        };

        let symlink_target = if entry_type == EntryType::Symlink && size <= MAX_SYMLINK_TARGET {
            let mut target = String::new();
            entry
                .by_ref()
                .take(MAX_SYMLINK_TARGET)
                .read_to_string(&mut target)
                .ok()
                .map(|_| target)
        } else {
            None
        };

        let raw = RawEntry {
            path,
            entry_type,
            size: if entry_type == EntryType::File { size } else { 0 },
            compressed_size,
            modified,
            mode: mode.map(|m| m & 0o7777),
            symlink_target,
            checksum,
            reader: match entry_type {
                EntryType::File => Some(&mut entry),
                _ => None,
            },
        };

        if visit(raw)? == Flow::Stop {
            return Ok(());
        }
    }

    Ok(())
}

fn zip_write_error(err: zip::result::ZipError, path: &Path) -> FulpackError {
    match err {
        zip::result::ZipError::Io(e) => FulpackError::from_io(&e, Operation::Create, path),
        other => FulpackError::new(
            crate::error::ErrorCode::ExtractionFailed,
            Operation::Create,
            other.to_string(),
        )
        .with_path(path),
    }
}

fn to_zip_datetime(when: DateTime<Utc>) -> zip::DateTime {
    // MS-DOS timestamps cover 1980-2107; out-of-range values fall back to
    // the zip crate's default epoch.
    zip::DateTime::from_date_and_time(
        when.year().clamp(1980, 2107) as u16,
        when.month() as u8,
        when.day() as u8,
        when.hour() as u8,
        when.minute() as u8,
        when.second().min(59) as u8,
    )
    .unwrap_or_default()
}

fn from_zip_datetime(dt: zip::DateTime) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(
        dt.year() as i32,
        dt.month() as u32,
        dt.day() as u32,
        dt.hour() as u32,
        dt.minute() as u32,
        dt.second() as u32,
    )
    .single()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_roundtrip_keeps_names_and_crc() {
        let dir = tempfile::tempdir().unwrap();
        let src_file = dir.path().join("data.bin");
        std::fs::write(&src_file, b"zip payload").unwrap();

        let sources = vec![
            SourceEntry {
                abs_path: dir.path().join("sub"),
                rel_path: "sub".into(),
                entry_type: EntryType::Directory,
                size: 0,
                mode: Some(0o755),
                modified: Utc::now(),
            },
            SourceEntry {
                abs_path: src_file,
                rel_path: "sub/data.bin".into(),
                entry_type: EntryType::File,
                size: 11,
                mode: Some(0o644),
                modified: Utc::now(),
            },
        ];
        let output = dir.path().join("out.zip");
        let summary = write(&sources, &output, &CreateOptions::default()).unwrap();
        assert_eq!(summary.entry_count, 2);
        assert!(summary.has_checksums);

        let mut names = Vec::new();
        read(&output, Operation::Scan, &mut |raw| {
            names.push((raw.path.clone(), raw.entry_type, raw.checksum.clone()));
            Ok(Flow::Continue)
        })
        .unwrap();

        assert_eq!(names.len(), 2);
        // ZIP convention: stored directory names end with the separator.
        assert_eq!(names[0].0, "sub/");
        assert_eq!(names[0].1, EntryType::Directory);
        assert!(names[0].2.is_none());
        assert_eq!(names[1].0, "sub/data.bin");
        assert!(names[1].2.as_deref().unwrap().starts_with("crc32:"));
    }

    #[test]
    fn dos_datetime_clamps_out_of_range_years() {
        let ancient = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        // Must not panic; the year is clamped into the DOS range.
        let _ = to_zip_datetime(ancient);
    }
}
