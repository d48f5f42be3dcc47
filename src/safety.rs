//! Entry-path safety validation.
//!
//! Pure, I/O-free classification of archive entry paths. Every operation that
//! writes to a filesystem runs entry names through [`validate_entry_path`]
//! before touching disk; `scan` and `verify` call it with
//! `allow_absolute = true` to inspect without trusting.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorCode, FulpackError, Operation};

/// Normalize a stored entry name to an OS-neutral form: backslashes become
/// forward slashes and empty / `.` segments are dropped. `..` segments are
/// kept so the validator sees them.
pub fn normalize_entry_path(raw: &str) -> String {
    raw.replace('\\', "/")
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Classify a candidate entry path.
///
/// Returns `None` when the path is safe to join under a destination
/// directory. Traversal is checked on the normalized form so encoded or
/// mixed-separator variants of `..` cannot slip through.
pub fn validate_entry_path(
    raw: &str,
    allow_absolute: bool,
    operation: Operation,
) -> Option<FulpackError> {
    let normalized = normalize_entry_path(raw);

    if normalized.split('/').any(|seg| seg == "..") {
        return Some(
            FulpackError::new(
                ErrorCode::PathTraversal,
                operation,
                format!("entry path '{raw}' contains a '..' segment"),
            )
            .with_path(raw),
        );
    }

    if !allow_absolute && is_absolute_form(raw) {
        return Some(
            FulpackError::new(
                ErrorCode::AbsolutePath,
                operation,
                format!("entry path '{raw}' is absolute"),
            )
            .with_path(raw),
        );
    }

    None
}

/// POSIX-absolute, Windows drive-letter, or UNC form, judged on the raw
/// string so drive prefixes are caught on every host OS.
fn is_absolute_form(raw: &str) -> bool {
    if raw.starts_with('/') || raw.starts_with('\\') {
        return true;
    }
    let bytes = raw.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Join a validated entry path under `destination`, keeping only normal
/// components. Callers must have run [`validate_entry_path`] first; this is
/// the belt to that suspender and silently drops anything non-normal.
pub fn join_under(destination: &Path, entry_path: &str) -> PathBuf {
    let normalized = normalize_entry_path(entry_path);
    let mut out = destination.to_path_buf();
    for comp in Path::new(&normalized).components() {
        if let Component::Normal(seg) = comp {
            out.push(seg);
        }
    }
    out
}

/// Whether a symlink target would resolve outside the directory containing
/// the link. Used by `verify` to flag escape-shaped targets; absolute targets
/// always count as escaping.
pub fn symlink_target_escapes(link_path: &str, target: &str) -> bool {
    if is_absolute_form(target) {
        return true;
    }
    // Resolve the target relative to the link's parent directory, counting
    // depth as we go; dropping below the virtual root is an escape.
    let link_norm = normalize_entry_path(link_path);
    let mut depth: i64 = link_norm.split('/').filter(|s| !s.is_empty()).count() as i64 - 1;
    for seg in normalize_entry_path(target).split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                depth -= 1;
                if depth < 0 {
                    return true;
                }
            }
            _ => depth += 1,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_relative_paths_pass() {
        assert!(validate_entry_path("a/b/c.txt", false, Operation::Extract).is_none());
        assert!(validate_entry_path("./a/b", false, Operation::Extract).is_none());
    }

    #[test]
    fn traversal_is_rejected() {
        let err = validate_entry_path("../../etc/passwd", false, Operation::Extract).unwrap();
        assert_eq!(err.code, ErrorCode::PathTraversal);
        // Interior and backslash-separated forms too.
        assert!(validate_entry_path("a/../../b", false, Operation::Extract).is_some());
        assert!(validate_entry_path("a\\..\\..\\b", false, Operation::Extract).is_some());
    }

    #[test]
    fn traversal_beats_absolute_in_classification() {
        let err = validate_entry_path("/../x", false, Operation::Extract).unwrap();
        assert_eq!(err.code, ErrorCode::PathTraversal);
    }

    #[test]
    fn absolute_paths_rejected_unless_allowed() {
        let err = validate_entry_path("/etc/passwd", false, Operation::Extract).unwrap();
        assert_eq!(err.code, ErrorCode::AbsolutePath);
        assert!(validate_entry_path("/etc/passwd", true, Operation::Scan).is_none());
        assert_eq!(
            validate_entry_path("C:\\Windows\\system32", false, Operation::Extract)
                .unwrap()
                .code,
            ErrorCode::AbsolutePath
        );
        assert_eq!(
            validate_entry_path("\\\\server\\share", false, Operation::Extract)
                .unwrap()
                .code,
            ErrorCode::AbsolutePath
        );
    }

    #[test]
    fn dot_segments_are_dropped_by_normalization() {
        assert_eq!(normalize_entry_path("./a//b/./c"), "a/b/c");
        assert_eq!(normalize_entry_path("a\\b\\c"), "a/b/c");
        assert_eq!(normalize_entry_path("a/../b"), "a/../b");
    }

    #[test]
    fn join_under_never_leaves_destination() {
        let dest = Path::new("/out");
        assert_eq!(join_under(dest, "a/b.txt"), PathBuf::from("/out/a/b.txt"));
        // Non-normal components are dropped even if a caller skipped validation.
        assert_eq!(join_under(dest, "/abs/file"), PathBuf::from("/out/abs/file"));
    }

    #[test]
    fn symlink_escape_detection() {
        assert!(!symlink_target_escapes("dir/link", "sibling.txt"));
        assert!(!symlink_target_escapes("dir/link", "../dir2/file"));
        assert!(symlink_target_escapes("dir/link", "../../outside"));
        assert!(symlink_target_escapes("link", "../outside"));
        assert!(symlink_target_escapes("dir/link", "/etc/passwd"));
    }
}
