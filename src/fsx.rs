//! Cross-platform filesystem helpers.
//!
//! POSIX permission handling lives here so extraction call-sites stay
//! identical across OSes: restoring a mode is a real `chmod` on Unix and a
//! no-op on Windows, where the bits have no meaning.

use std::io;
use std::path::Path;

#[cfg(unix)]
/// Set POSIX permission bits on Unix.
pub fn set_unix_permissions(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
/// No-op on non-Unix targets: POSIX permission bits are not preserved.
pub fn set_unix_permissions(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Permission bits of a file, where the platform has them.
#[cfg(unix)]
pub fn unix_mode(metadata: &std::fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
pub fn unix_mode(_metadata: &std::fs::Metadata) -> Option<u32> {
    None
}
