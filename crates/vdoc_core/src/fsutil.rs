//! Small filesystem helpers shared by the storage modules.

use crate::error::Result;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::time::SystemTime;

/// Writes `data` to `path` atomically: temp file + fsync + rename.
///
/// Readers see either the old content or the new content, never a mix.
/// `mode` sets Unix permission bits on the new file.
pub(crate) fn write_atomic(path: &Path, data: &[u8], mode: Option<u32>) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    // Unique per writer so concurrent best-effort writers never share a temp file
    let tmp_path = crate::paths::with_suffix(path, &format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    set_mode(&tmp_path, mode)?;

    fs::rename(&tmp_path, path)?;

    // fsync parent directory (Unix-specific for crash safety)
    #[cfg(unix)]
    {
        if let Some(dir) = path.parent() {
            if let Ok(dir_file) = File::open(dir) {
                let _ = dir_file.sync_all();
            }
        }
    }

    Ok(())
}

/// True for the temp files [`write_atomic`] leaves behind if interrupted.
pub(crate) fn is_temp_file_name(name: &str) -> bool {
    name.strip_suffix(".tmp")
        .and_then(|stem| stem.rsplit_once('.'))
        .map_or(false, |(_, tag)| tag.len() == 32 && tag.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Applies Unix permission bits; a no-op elsewhere or when `mode` is `None`.
pub(crate) fn set_mode(path: &Path, mode: Option<u32>) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Some(mode) = mode {
            fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
        }
    }
    #[cfg(not(unix))]
    let _ = (path, mode);
    Ok(())
}

/// Removes a file, treating "already gone" as success.
pub(crate) fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Sets the modification time of `path` to that of `reference`.
pub(crate) fn copy_mtime(reference: &Path, path: &Path) -> Result<()> {
    let modified: SystemTime = fs::metadata(reference)?.modified()?;
    File::options().write(true).open(path)?.set_modified(modified)?;
    Ok(())
}

/// Recursively copies a directory tree. Files keep their modification
/// times, so a primary stays no newer than its history.
pub(crate) fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
            copy_mtime(&src_path, &dst_path)?;
        }
    }
    Ok(())
}
