//! TAR and TAR+GZIP adapters.
//!
//! Entries are streamed in insertion order with directories ahead of their
//! children; the gzip variant layers a `flate2` encoder/decoder around the
//! same tar logic. Decoding stops at the first complete gzip member, so
//! trailing garbage after the stream is tolerated.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression as GzLevel;

use crate::checksum;
use crate::common::EntryType;
use crate::error::{FulpackError, Operation};
use crate::options::CreateOptions;

use super::{cancelled_error, corrupt_error, open_archive, Flow, RawEntry, SourceEntry, WriteSummary};

pub fn write_plain(
    sources: &[SourceEntry],
    output: &Path,
    options: &CreateOptions,
) -> Result<WriteSummary, FulpackError> {
    let file = File::create(output)
        .map_err(|e| FulpackError::from_io(&e, Operation::Create, output))?;
    let mut builder = tar::Builder::new(BufWriter::new(file));
    let summary = append_all(&mut builder, sources, options)?;
    let mut writer = builder
        .into_inner()
        .map_err(|e| FulpackError::from_io(&e, Operation::Create, output))?;
    writer
        .flush()
        .map_err(|e| FulpackError::from_io(&e, Operation::Create, output))?;
    Ok(summary)
}

pub fn write_gzip(
    sources: &[SourceEntry],
    output: &Path,
    options: &CreateOptions,
) -> Result<WriteSummary, FulpackError> {
    let file = File::create(output)
        .map_err(|e| FulpackError::from_io(&e, Operation::Create, output))?;
    let encoder = GzEncoder::new(
        BufWriter::new(file),
        GzLevel::new(options.compression_level),
    );
    let mut builder = tar::Builder::new(encoder);
    let summary = append_all(&mut builder, sources, options)?;
    let encoder = builder
        .into_inner()
        .map_err(|e| FulpackError::from_io(&e, Operation::Create, output))?;
    let mut writer = encoder
        .finish()
        .map_err(|e| FulpackError::from_io(&e, Operation::Create, output))?;
    writer
        .flush()
        .map_err(|e| FulpackError::from_io(&e, Operation::Create, output))?;
    Ok(summary)
}

fn append_all<W: Write>(
    builder: &mut tar::Builder<W>,
    sources: &[SourceEntry],
    options: &CreateOptions,
) -> Result<WriteSummary, FulpackError> {
    let mut summary = WriteSummary::default();

    for src in sources {
        if options.cancel.is_cancelled() {
            return Err(cancelled_error(Operation::Create));
        }

        let mut header = tar::Header::new_gnu();
        header.set_mtime(src.modified.timestamp().max(0) as u64);
        let mode = if options.preserve_permissions {
            src.mode
        } else {
            None
        };

        match src.entry_type {
            EntryType::Directory => {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_size(0);
                header.set_mode(mode.unwrap_or(0o755));
                let name = format!("{}/", src.rel_path);
                builder
                    .append_data(&mut header, name, io::empty())
                    .map_err(|e| FulpackError::from_io(&e, Operation::Create, &src.abs_path))?;
            }
            EntryType::File => {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_size(src.size);
                header.set_mode(mode.unwrap_or(0o644));

                if let Some(algo) = options.checksum_algorithm {
                    let mut file = File::open(&src.abs_path).map_err(|e| {
                        FulpackError::from_io(&e, Operation::Create, &src.abs_path)
                    })?;
                    let digest = checksum::hash_reader(&mut file, algo).map_err(|e| {
                        FulpackError::from_io(&e, Operation::Create, &src.abs_path)
                    })?;
                    // The PAX value is the bare hex; the key names the algorithm.
                    let hex = digest.split(':').nth(1).unwrap_or(&digest).to_string();
                    builder
                        .append_pax_extensions([(algo.pax_key(), hex.as_bytes())])
                        .map_err(|e| {
                            FulpackError::from_io(&e, Operation::Create, &src.abs_path)
                        })?;
                    summary.has_checksums = true;
                }

                let file = File::open(&src.abs_path)
                    .map_err(|e| FulpackError::from_io(&e, Operation::Create, &src.abs_path))?;
                builder
                    .append_data(&mut header, &src.rel_path, file)
                    .map_err(|e| FulpackError::from_io(&e, Operation::Create, &src.abs_path))?;
                summary.total_size += src.size;
            }
            // The source walker either skips symlinks or resolves them into
            // regular files, so none reach the adapters.
            EntryType::Symlink => continue,
        }

        summary.entry_count += 1;
    }

    Ok(summary)
}

pub fn read_plain(
    archive: &Path,
    operation: Operation,
    visit: &mut dyn FnMut(RawEntry<'_>) -> Result<Flow, FulpackError>,
) -> Result<(), FulpackError> {
    let file = open_archive(archive, operation)?;
    walk(tar::Archive::new(BufReader::new(file)), archive, operation, visit)
}

pub fn read_gzip(
    archive: &Path,
    operation: Operation,
    visit: &mut dyn FnMut(RawEntry<'_>) -> Result<Flow, FulpackError>,
) -> Result<(), FulpackError> {
    let file = open_archive(archive, operation)?;
    // GzDecoder stops after the first gzip member; bytes past it are ignored.
    let decoder = GzDecoder::new(BufReader::new(file));
    walk(tar::Archive::new(decoder), archive, operation, visit)
}

fn walk<R: Read>(
    mut archive: tar::Archive<R>,
    archive_path: &Path,
    operation: Operation,
    visit: &mut dyn FnMut(RawEntry<'_>) -> Result<Flow, FulpackError>,
) -> Result<(), FulpackError> {
    let entries = archive
        .entries()
        .map_err(|e| corrupt_error(operation, archive_path, &e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| corrupt_error(operation, archive_path, &e))?;

        let entry_type = match entry.header().entry_type() {
            tar::EntryType::Directory => EntryType::Directory,
            tar::EntryType::Symlink => EntryType::Symlink,
            tar::EntryType::Regular | tar::EntryType::Continuous | tar::EntryType::GNUSparse => {
                EntryType::File
            }
            // Hard links, fifos and device nodes are not part of the entry
            // model; PAX and longname records are consumed by the iterator.
            _ => continue,
        };

        let path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let size = entry.size();
        let mode = entry.header().mode().ok();
        let modified = entry
            .header()
            .mtime()
            .ok()
            .and_then(|secs| chrono::DateTime::from_timestamp(secs as i64, 0));
        let symlink_target = entry
            .link_name()
            .ok()
            .flatten()
            .map(|target| target.to_string_lossy().into_owned());
        let checksum = embedded_checksum(&mut entry);

        let raw = RawEntry {
            path,
            entry_type,
            size: if entry_type == EntryType::File { size } else { 0 },
            compressed_size: None,
            modified,
            mode,
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

/// Pull a `FULPACK.<algo>` digest out of the entry's PAX records, if present.
fn embedded_checksum<R: Read>(entry: &mut tar::Entry<'_, R>) -> Option<String> {
    let extensions = entry.pax_extensions().ok()??;
    for ext in extensions {
        let Ok(ext) = ext else { continue };
        let Ok(key) = ext.key() else { continue };
        let algo = match key {
            "FULPACK.sha256" => "sha256",
            "FULPACK.blake3" => "blake3",
            _ => continue,
        };
        if let Ok(value) = ext.value() {
            return Some(format!("{algo}:{value}"));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::Format;

    #[test]
    fn tar_write_then_walk_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let src_file = dir.path().join("hello.txt");
        std::fs::write(&src_file, b"hello tar").unwrap();

        let sources = vec![SourceEntry {
            abs_path: src_file,
            rel_path: "hello.txt".into(),
            entry_type: EntryType::File,
            size: 9,
            mode: Some(0o644),
            modified: chrono::Utc::now(),
        }];
        let output = dir.path().join("out.tar");
        let options = CreateOptions::default();
        let summary = write_plain(&sources, &output, &options).unwrap();
        assert_eq!(summary.entry_count, 1);
        assert_eq!(summary.total_size, 9);
        assert!(summary.has_checksums);

        let mut seen = Vec::new();
        read_plain(&output, Operation::Scan, &mut |raw| {
            let mut content = Vec::new();
            if let Some(reader) = raw.reader {
                reader.read_to_end(&mut content).unwrap();
            }
            seen.push((raw.path.clone(), content, raw.checksum.clone()));
            Ok(Flow::Continue)
        })
        .unwrap();

        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "hello.txt");
        assert_eq!(seen[0].1, b"hello tar");
        let digest = seen[0].2.as_deref().unwrap();
        assert_eq!(digest, checksum::hash(b"hello tar", Default::default()).as_str());
    }

    #[test]
    fn gzip_variant_tolerates_trailing_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let src_file = dir.path().join("a.txt");
        std::fs::write(&src_file, b"payload").unwrap();

        let sources = vec![SourceEntry {
            abs_path: src_file,
            rel_path: "a.txt".into(),
            entry_type: EntryType::File,
            size: 7,
            mode: None,
            modified: chrono::Utc::now(),
        }];
        let output = dir.path().join("out.tar.gz");
        write_gzip(&sources, &output, &CreateOptions::default()).unwrap();

        // Append junk past the gzip member; decoding must still succeed.
        use std::io::Write as _;
        let mut f = std::fs::OpenOptions::new().append(true).open(&output).unwrap();
        f.write_all(b"#### trailing garbage ####").unwrap();

        assert_eq!(Format::from_path(&output), Some(Format::TarGz));
        let mut count = 0;
        read_gzip(&output, Operation::Scan, &mut |_raw| {
            count += 1;
            Ok(Flow::Continue)
        })
        .unwrap();
        assert_eq!(count, 1);
    }
}
