use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Windows sharing violation / lock violation.
const ERROR_SHARING_VIOLATION: i32 = 32;
const ERROR_LOCK_VIOLATION: i32 = 33;

/// Move a file from `src` to `dst`. Uses `rename` first (atomic on the same
/// filesystem) and falls back to copy + delete for cross-device moves.
fn move_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    std::fs::copy(src, dst).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    std::fs::remove_file(src).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

/// Applies file moves into disposition buckets below a base directory.
pub struct FileStorage {
    base_directory: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(base_directory: P) -> Self {
        Self {
            base_directory: base_directory.as_ref().to_path_buf(),
        }
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// Moves `source` into `<base>/<bucket>/`, keeping its file name unless
    /// taken, in which case `_2`, `_3`, ... is appended.
    pub fn move_to_bucket<P: AsRef<Path>>(
        &self,
        source: P,
        bucket: &str,
    ) -> Result<PathBuf, StorageError> {
        let source = source.as_ref();
        let bucket_dir = self.base_directory.join(bucket);
        ensure_directory(&bucket_dir)?;

        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document");
        let destination = resolve_conflict(&bucket_dir, name)?;

        move_file(source, &destination)?;
        Ok(destination)
    }
}

pub fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Finds an unused name for `filename` inside `directory`.
pub fn resolve_conflict(directory: &Path, filename: &str) -> Result<PathBuf, StorageError> {
    let path = directory.join(filename);

    // symlink_metadata also catches broken symlinks
    if std::fs::symlink_metadata(&path).is_err() {
        return Ok(path);
    }

    let (base, ext) = match filename.rfind('.') {
        Some(dot_pos) if dot_pos > 0 => (&filename[..dot_pos], Some(&filename[dot_pos..])),
        _ => (filename, None),
    };

    for counter in 2..=1000 {
        let new_filename = match ext {
            Some(ext) => format!("{}_{}{}", base, counter, ext),
            None => format!("{}_{}", base, counter),
        };

        let new_path = directory.join(&new_filename);
        if std::fs::symlink_metadata(&new_path).is_err() {
            return Ok(new_path);
        }
    }

    Err(StorageError::FileExists(path))
}

/// Fails with `ResourceBusy` when `path` is open for editing elsewhere:
/// an office lock file sits next to it, or the OS refuses write access.
pub fn check_not_busy(path: &Path) -> Result<(), StorageError> {
    if let (Some(dir), Some(name)) = (path.parent(), path.file_name().and_then(|n| n.to_str())) {
        let lock_files = [format!("~${}", name), format!(".~lock.{}#", name)];
        for lock in &lock_files {
            if dir.join(lock).exists() {
                return Err(StorageError::ResourceBusy {
                    path: path.to_path_buf(),
                    reason: format!("lock file {} present", lock),
                });
            }
        }
    }

    if !path.exists() {
        return Ok(());
    }

    match std::fs::OpenOptions::new().append(true).open(path) {
        Ok(_) => Ok(()),
        Err(e)
            if e.kind() == ErrorKind::PermissionDenied
                || matches!(
                    e.raw_os_error(),
                    Some(ERROR_SHARING_VIOLATION) | Some(ERROR_LOCK_VIOLATION)
                ) =>
        {
            Err(StorageError::ResourceBusy {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
        Err(e) => Err(StorageError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
