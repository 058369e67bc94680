use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::storage::filesystem::ensure_directory;

pub const ARCHIVED_KEYS_FILENAME: &str = "archived_keys.txt";

/// Dedupe keys of records that already reached the downstream store,
/// one key per line. Read at batch start, appended after an upload.
pub struct ArchivedKeyStore {
    path: PathBuf,
}

impl ArchivedKeyStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// `<output>/archived_keys.txt`
    pub fn in_directory<P: AsRef<Path>>(output_directory: P) -> Self {
        Self::new(output_directory.as_ref().join(ARCHIVED_KEYS_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty set.
    pub fn load(&self) -> Result<HashSet<String>, StorageError> {
        if !self.path.exists() {
            return Ok(HashSet::new());
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| StorageError::ReadFile {
            path: self.path.clone(),
            source: e,
        })?;

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Appends keys not yet recorded. Returns how many were written.
    pub fn append<'a, I>(&self, keys: I) -> Result<usize, StorageError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut known = self.load()?;
        let new_keys: Vec<&str> = keys
            .into_iter()
            .map(str::trim)
            .filter(|k| !k.is_empty() && known.insert(k.to_string()))
            .collect();

        if new_keys.is_empty() {
            return Ok(0);
        }

        if let Some(parent) = self.path.parent() {
            ensure_directory(parent)?;
        }

        let write_err = |e| StorageError::WriteFile {
            path: self.path.clone(),
            source: e,
        };
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(write_err)?;
        for key in &new_keys {
            writeln!(file, "{}", key).map_err(write_err)?;
        }

        log::debug!("Recorded {} archived dedupe key(s)", new_keys.len());
        Ok(new_keys.len())
    }
}
