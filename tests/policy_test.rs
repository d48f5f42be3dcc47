//! Option handling: overwrite policies, include filters, invalid options and
//! cooperative cancellation.

use std::fs;

use fulpack::cancel::CancelToken;
use fulpack::create::create_sync;
use fulpack::error::ErrorCode;
use fulpack::extract::extract_sync;
use fulpack::formats::Format;
use fulpack::options::{CreateOptions, ExtractOptions, OverwritePolicy};
use tempfile::tempdir;

fn archive_with_one_file(content: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
    let src = tempdir().unwrap();
    fs::write(src.path().join("file.txt"), content).unwrap();

    let work = tempdir().unwrap();
    let archive = work.path().join("one.tar");
    create_sync(
        &[src.path().to_path_buf()],
        &archive,
        Format::Tar,
        &CreateOptions::default(),
    )
    .unwrap();
    (work, archive)
}

#[test]
fn overwrite_error_leaves_existing_file() {
    let (_work, archive) = archive_with_one_file(b"new content");
    let out = tempdir().unwrap();
    fs::write(out.path().join("file.txt"), b"original").unwrap();

    let result = extract_sync(&archive, out.path(), &ExtractOptions::default()).unwrap();
    assert_eq!(result.error_count, 1);
    assert_eq!(result.extracted_count, 0);
    assert_eq!(fs::read(out.path().join("file.txt")).unwrap(), b"original");
}

#[test]
fn overwrite_skip_counts_and_preserves() {
    let (_work, archive) = archive_with_one_file(b"new content");
    let out = tempdir().unwrap();
    fs::write(out.path().join("file.txt"), b"original").unwrap();

    let options = ExtractOptions {
        overwrite: OverwritePolicy::Skip,
        ..Default::default()
    };
    let result = extract_sync(&archive, out.path(), &options).unwrap();
    assert_eq!(result.error_count, 0);
    assert_eq!(result.skipped_count, 1);
    assert_eq!(fs::read(out.path().join("file.txt")).unwrap(), b"original");
}

#[test]
fn overwrite_policy_replaces_file() {
    let (_work, archive) = archive_with_one_file(b"new content");
    let out = tempdir().unwrap();
    fs::write(out.path().join("file.txt"), b"original").unwrap();

    let options = ExtractOptions {
        overwrite: OverwritePolicy::Overwrite,
        ..Default::default()
    };
    let result = extract_sync(&archive, out.path(), &options).unwrap();
    assert_eq!(result.extracted_count, 1);
    assert_eq!(fs::read(out.path().join("file.txt")).unwrap(), b"new content");
}

#[test]
fn include_patterns_limit_extraction() {
    let src = tempdir().unwrap();
    fs::write(src.path().join("wanted.txt"), b"yes").unwrap();
    fs::write(src.path().join("ignored.log"), b"no").unwrap();

    let work = tempdir().unwrap();
    let archive = work.path().join("mixed.zip");
    create_sync(
        &[src.path().to_path_buf()],
        &archive,
        Format::Zip,
        &CreateOptions::default(),
    )
    .unwrap();

    let out = tempdir().unwrap();
    let options = ExtractOptions {
        include_patterns: vec!["*.txt".into()],
        ..Default::default()
    };
    let result = extract_sync(&archive, out.path(), &options).unwrap();
    assert_eq!(result.extracted_count, 1);
    assert_eq!(result.skipped_count, 1);
    assert!(out.path().join("wanted.txt").exists());
    assert!(!out.path().join("ignored.log").exists());
}

#[test]
fn compression_level_out_of_range_is_rejected() {
    let src = tempdir().unwrap();
    fs::write(src.path().join("x"), b"x").unwrap();
    let options = CreateOptions {
        compression_level: 12,
        ..Default::default()
    };
    let err = create_sync(
        &[src.path().to_path_buf()],
        &src.path().join("out.tar.gz"),
        Format::TarGz,
        &options,
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidOptions);
}

#[test]
fn gzip_format_rejects_directory_source() {
    let src = tempdir().unwrap();
    fs::write(src.path().join("a"), b"a").unwrap();
    fs::write(src.path().join("b"), b"b").unwrap();

    let work = tempdir().unwrap();
    let err = create_sync(
        &[src.path().to_path_buf()],
        &work.path().join("out.gz"),
        Format::Gzip,
        &CreateOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidOptions);
}

#[test]
fn unrecognized_suffix_is_invalid_format() {
    let work = tempdir().unwrap();
    fs::write(work.path().join("data.rar"), b"not ours").unwrap();
    let out = tempdir().unwrap();
    let err = extract_sync(
        &work.path().join("data.rar"),
        out.path(),
        &ExtractOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidArchiveFormat);
}

#[test]
fn missing_archive_is_reported() {
    let work = tempdir().unwrap();
    let out = tempdir().unwrap();
    let err = extract_sync(
        &work.path().join("ghost.tar"),
        out.path(),
        &ExtractOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::ArchiveNotFound);
}

#[test]
fn truncated_tar_gz_is_corrupt() {
    let src = tempdir().unwrap();
    fs::write(src.path().join("file.txt"), vec![7u8; 64 * 1024]).unwrap();

    let work = tempdir().unwrap();
    let archive = work.path().join("trunc.tar.gz");
    create_sync(
        &[src.path().to_path_buf()],
        &archive,
        Format::TarGz,
        &CreateOptions::default(),
    )
    .unwrap();

    let bytes = fs::read(&archive).unwrap();
    fs::write(&archive, &bytes[..bytes.len() / 2]).unwrap();

    let out = tempdir().unwrap();
    let outcome = extract_sync(&archive, out.path(), &ExtractOptions::default());
    match outcome {
        Err(err) => assert_eq!(err.code, ErrorCode::ArchiveCorrupt),
        Ok(result) => assert!(
            result.errors.iter().any(|e| e.code == ErrorCode::ArchiveCorrupt),
            "truncation must surface as corruption: {result:?}"
        ),
    }
}

#[tokio::test]
async fn pre_cancelled_extract_returns_partial_result() {
    let src = tempdir().unwrap();
    fs::write(src.path().join("a.txt"), b"a").unwrap();
    fs::write(src.path().join("b.txt"), b"b").unwrap();

    let work = tempdir().unwrap();
    let archive = work.path().join("cancel.tar");
    create_sync(
        &[src.path().to_path_buf()],
        &archive,
        Format::Tar,
        &CreateOptions::default(),
    )
    .unwrap();

    let token = CancelToken::new();
    token.cancel();
    let out = tempdir().unwrap();
    let options = ExtractOptions {
        cancel: token,
        ..Default::default()
    };
    let result = fulpack::extract(&archive, out.path(), options).await.unwrap();
    assert_eq!(result.extracted_count, 0);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("cancelled")));
}

#[tokio::test]
async fn cancelled_create_fails_cleanly() {
    let src = tempdir().unwrap();
    fs::write(src.path().join("a.txt"), b"a").unwrap();

    let token = CancelToken::new();
    token.cancel();
    let work = tempdir().unwrap();
    let options = CreateOptions {
        cancel: token,
        ..Default::default()
    };
    let err = fulpack::create(
        &[src.path().to_path_buf()],
        &work.path().join("out.tar"),
        Format::Tar,
        options,
    )
    .await
    .unwrap_err();
    assert!(err.message.contains("cancelled"));
}
