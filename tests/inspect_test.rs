//! Scan filtering, info aggregation edge cases and verify's check gating.

use std::fs;

use fulpack::common::{EntryType, ValidationCheck};
use fulpack::create::create_sync;
use fulpack::formats::Format;
use fulpack::inspect::{info_sync, scan_sync, verify_sync};
use fulpack::options::{CreateOptions, ScanOptions, VerifyOptions};
use tempfile::tempdir;

fn sample_archive(format: Format, name: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let src = tempdir().unwrap();
    fs::create_dir_all(src.path().join("nested/deep")).unwrap();
    fs::write(src.path().join("top.txt"), b"top").unwrap();
    fs::write(src.path().join("nested/mid.txt"), b"mid").unwrap();
    fs::write(src.path().join("nested/deep/leaf.txt"), b"leaf").unwrap();

    let work = tempdir().unwrap();
    let archive = work.path().join(name);
    create_sync(
        &[src.path().to_path_buf()],
        &archive,
        format,
        &CreateOptions::default(),
    )
    .unwrap();
    (work, archive)
}

#[test]
fn entry_type_filter_restricts_listing() {
    let (_work, archive) = sample_archive(Format::Tar, "filter.tar");

    let options = ScanOptions {
        entry_types: Some(vec![EntryType::Directory]),
        ..Default::default()
    };
    let entries = scan_sync(&archive, &options).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.entry_type == EntryType::Directory));
}

#[test]
fn max_depth_drops_nested_entries() {
    let (_work, archive) = sample_archive(Format::Tar, "depth.tar");

    let options = ScanOptions {
        max_depth: Some(1),
        ..Default::default()
    };
    let entries = scan_sync(&archive, &options).unwrap();
    let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["nested", "top.txt"]);
}

#[test]
fn metadata_can_be_omitted() {
    let (_work, archive) = sample_archive(Format::Tar, "bare.tar");

    let options = ScanOptions {
        include_metadata: false,
        ..Default::default()
    };
    let entries = scan_sync(&archive, &options).unwrap();
    assert!(entries.iter().all(|e| e.checksum.is_none() && e.mode.is_none()));

    let full = scan_sync(&archive, &ScanOptions::default()).unwrap();
    assert!(full
        .iter()
        .filter(|e| e.entry_type == EntryType::File)
        .all(|e| e.checksum.is_some() && e.mode.is_some()));
}

#[test]
fn empty_archive_has_unit_ratio() {
    let src = tempdir().unwrap(); // no files at all
    let work = tempdir().unwrap();
    let archive = work.path().join("empty.tar");
    create_sync(
        &[src.path().to_path_buf()],
        &archive,
        Format::Tar,
        &CreateOptions::default(),
    )
    .unwrap();

    let info = info_sync(&archive).unwrap();
    assert_eq!(info.entry_count, 0);
    assert_eq!(info.total_size, 0);
    assert_eq!(info.compression_ratio, 1.0);
}

#[test]
fn verify_reports_checks_for_clean_archive() {
    let (_work, archive) = sample_archive(Format::TarGz, "clean.tar.gz");

    let report = verify_sync(&archive, &VerifyOptions::default()).unwrap();
    assert!(report.valid);
    assert_eq!(report.entry_count, 5);
    assert_eq!(report.checksums_verified, 3);
    assert_eq!(
        report.checks_performed,
        vec![
            ValidationCheck::StructureValid,
            ValidationCheck::NoPathTraversal,
            ValidationCheck::NoDecompressionBomb,
            ValidationCheck::ChecksumsVerified,
        ],
        "symlinks_safe only runs when a symlink entry exists"
    );
}

#[test]
fn verify_without_checksum_pass_skips_that_check() {
    let (_work, archive) = sample_archive(Format::Tar, "nosum.tar");

    let options = VerifyOptions {
        verify_checksums: false,
        ..Default::default()
    };
    let report = verify_sync(&archive, &options).unwrap();
    assert!(report.valid);
    assert_eq!(report.checksums_verified, 0);
    assert!(!report
        .checks_performed
        .contains(&ValidationCheck::ChecksumsVerified));
}

#[test]
fn verify_flags_corrupt_container() {
    let work = tempdir().unwrap();
    let archive = work.path().join("garbage.zip");
    fs::write(&archive, b"PK\x03\x04 but not really a zip file").unwrap();

    let report = verify_sync(&archive, &VerifyOptions::default()).unwrap();
    assert!(!report.valid);
    assert!(!report.errors.is_empty());
    assert_eq!(report.checks_performed, vec![ValidationCheck::StructureValid]);
}

#[test]
fn zip_entries_carry_container_crc() {
    let (_work, archive) = sample_archive(Format::Zip, "crc.zip");

    let entries = scan_sync(&archive, &ScanOptions::default()).unwrap();
    for entry in entries.iter().filter(|e| e.entry_type == EntryType::File) {
        let checksum = entry.checksum.as_deref().unwrap();
        assert!(checksum.starts_with("crc32:"), "got {checksum}");
    }

    let report = verify_sync(&archive, &VerifyOptions::default()).unwrap();
    assert!(report.valid);
    assert_eq!(report.checksums_verified, 3);
}
