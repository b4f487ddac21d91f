//! Atomic file replacement.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Write `content` to a `<name>.tmp` sibling, then rename it over `path`.
///
/// On failure the temporary file is removed and `path` is left untouched.
pub fn write_atomic(path: &Path, content: &str) -> io::Result<()> {
    let tmp = temp_path(path);
    if let Err(e) = fs::write(&tmp, content).and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
