//! Single-file GZIP adapter.
//!
//! A `.gz` archive wraps exactly one file. Creation rejects directories and
//! multi-file input; decoding yields a single pseudo-entry whose name comes
//! from the gzip header when present and from the archive stem otherwise.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression as GzLevel;

use crate::common::EntryType;
use crate::error::{ErrorCode, FulpackError, Operation};
use crate::options::CreateOptions;

use super::{corrupt_error, open_archive, Flow, RawEntry, SourceEntry, WriteSummary};

pub fn write_single(
    sources: &[SourceEntry],
    output: &Path,
    options: &CreateOptions,
) -> Result<WriteSummary, FulpackError> {
    let files: Vec<&SourceEntry> = sources
        .iter()
        .filter(|s| s.entry_type == EntryType::File)
        .collect();
    if files.len() != 1 || files.len() != sources.len() {
        return Err(FulpackError::new(
            ErrorCode::InvalidOptions,
            Operation::Create,
            format!(
                "gzip archives hold exactly one file, got {} source entries",
                sources.len()
            ),
        ));
    }
    let src = files[0];

    let out_file = File::create(output)
        .map_err(|e| FulpackError::from_io(&e, Operation::Create, output))?;
    let mut encoder = GzEncoder::new(
        BufWriter::new(out_file),
        GzLevel::new(options.compression_level),
    );
    let mut input = File::open(&src.abs_path)
        .map_err(|e| FulpackError::from_io(&e, Operation::Create, &src.abs_path))?;
    io::copy(&mut input, &mut encoder)
        .map_err(|e| FulpackError::from_io(&e, Operation::Create, &src.abs_path))?;
    let mut writer = encoder
        .finish()
        .map_err(|e| FulpackError::from_io(&e, Operation::Create, output))?;
    writer
        .flush()
        .map_err(|e| FulpackError::from_io(&e, Operation::Create, output))?;

    Ok(WriteSummary {
        entry_count: 1,
        total_size: src.size,
        has_checksums: false,
    })
}

pub fn read_single(
    archive: &Path,
    operation: Operation,
    visit: &mut dyn FnMut(RawEntry<'_>) -> Result<Flow, FulpackError>,
) -> Result<(), FulpackError> {
    let file = open_archive(archive, operation)?;
    let mut decoder = GzDecoder::new(BufReader::new(file));

    let (header_name, header_mtime) = match decoder.header() {
        Some(header) => (
            header
                .filename()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned()),
            match header.mtime() {
                0 => None,
                secs => chrono::DateTime::from_timestamp(secs as i64, 0),
            },
        ),
        None => (None, None),
    };

    let path = header_name.unwrap_or_else(|| stem_name(archive));
    if path.is_empty() {
        return Err(corrupt_error(operation, archive, &"gzip member has no derivable name"));
    }

    // The uncompressed length is unknown until the stream is drained, so the
    // pseudo-entry reports 0 and consumers account bytes as they read.
    let raw = RawEntry {
        path,
        entry_type: EntryType::File,
        size: 0,
        compressed_size: None,
        modified: header_mtime,
        mode: None,
        symlink_target: None,
        checksum: None,
        reader: Some(&mut decoder),
    };
    visit(raw)?;
    Ok(())
}

/// Archive filename with the trailing `.gz` removed.
fn stem_name(archive: &Path) -> String {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.strip_suffix(".gz")
        .or_else(|| name.strip_suffix(".GZ"))
        .unwrap_or(&name)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn source_for(path: &Path, size: u64, entry_type: EntryType) -> SourceEntry {
        SourceEntry {
            abs_path: path.to_path_buf(),
            rel_path: path.file_name().unwrap().to_string_lossy().into_owned(),
            entry_type,
            size,
            mode: None,
            modified: chrono::Utc::now(),
        }
    }

    #[test]
    fn single_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("notes.txt");
        std::fs::write(&src, b"gzip me").unwrap();

        let output = dir.path().join("notes.txt.gz");
        let summary = write_single(
            &[source_for(&src, 7, EntryType::File)],
            &output,
            &CreateOptions::default(),
        )
        .unwrap();
        assert_eq!(summary.entry_count, 1);

        let mut entries = Vec::new();
        read_single(&output, Operation::Scan, &mut |raw| {
            let mut content = Vec::new();
            raw.reader.unwrap().read_to_end(&mut content).unwrap();
            entries.push((raw.path.clone(), content));
            Ok(Flow::Continue)
        })
        .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "notes.txt");
        assert_eq!(entries[0].1, b"gzip me");
    }

    #[test]
    fn multi_file_input_is_invalid_options() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, b"x").unwrap();
        std::fs::write(&b, b"y").unwrap();

        let err = write_single(
            &[
                source_for(&a, 1, EntryType::File),
                source_for(&b, 1, EntryType::File),
            ],
            &dir.path().join("out.gz"),
            &CreateOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidOptions);
    }

    #[test]
    fn directory_input_is_invalid_options() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_single(
            &[source_for(dir.path(), 0, EntryType::Directory)],
            &dir.path().join("out.gz"),
            &CreateOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidOptions);
    }
}
