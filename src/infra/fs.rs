//! Filesystem utilities for reading, atomic writing and working-tree materialization.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::objects::FileMode;

/// Reads the entire contents of a file as bytes.
///
/// Returns `Ok(None)` if the file does not exist, so callers can map the
/// absence to their own domain error.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Option<Vec<u8>>> {
    match fs::read(path.as_ref()) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Returns true if anything (file, directory, or dangling symlink) exists at `path`.
pub fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Writes data to a file atomically.
///
/// The bytes go to a sibling temporary file first, which is synced and
/// then renamed over the target. A failure at any point leaves the
/// previous file untouched.
pub fn write_file_atomic<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = {
        let mut temp = path.to_path_buf();
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "temp".to_string());
        temp.set_file_name(format!(".{}.tmp", file_name));
        temp
    };

    let written = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()
    })();
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Materializes blob content at `path` with the permissions of `mode`.
///
/// Parent directories are created as needed. Whatever currently occupies
/// `path` as a file or symlink is replaced rather than written through.
/// Symlink entries become symbolic links on Unix; elsewhere they are
/// written as plain files holding the link target.
pub fn write_worktree_file(path: &Path, content: &[u8], mode: FileMode) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    if let Ok(meta) = fs::symlink_metadata(path) {
        if meta.is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
    }

    #[cfg(unix)]
    {
        if mode == FileMode::Symlink {
            let target = String::from_utf8_lossy(content).into_owned();
            std::os::unix::fs::symlink(target, path)?;
            return Ok(());
        }
    }

    fs::write(path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let bits = if mode == FileMode::Executable {
            0o755
        } else {
            0o644
        };
        fs::set_permissions(path, fs::Permissions::from_mode(bits))?;
    }

    Ok(())
}

/// Removes a file, symlink or directory tree at `path`.
///
/// Missing paths are not an error.
pub fn remove_path(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path)?,
        Ok(_) => fs::remove_file(path)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
