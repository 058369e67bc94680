use std::path::{Path, PathBuf};

use log::{debug, info};
use walkdir::WalkDir;

use crate::config::DocumentFormat;
use crate::error::WorkerError;
use crate::worker::job::DocumentJob;

pub struct DirectoryScanner {
    input_directory: PathBuf,
}

impl DirectoryScanner {
    pub fn new<P: AsRef<Path>>(input_directory: P) -> Self {
        Self {
            input_directory: input_directory.as_ref().to_path_buf(),
        }
    }

    pub fn input_directory(&self) -> &Path {
        &self.input_directory
    }

    /// Finds every supported document below the inbox, recursively, in a
    /// stable (sorted) order so batch indices are reproducible.
    pub fn scan(&self) -> Result<Vec<DocumentJob>, WorkerError> {
        let mut paths = Vec::new();

        for entry in WalkDir::new(&self.input_directory)
            .min_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| WorkerError::ScanFailed {
                path: self.input_directory.clone(),
                source: e,
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let supported = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(DocumentFormat::from_extension)
                .is_some();
            if supported {
                debug!("Found document: {}", path.display());
                paths.push(path.to_path_buf());
            }
        }

        info!(
            "Scanned {} documents in {}",
            paths.len(),
            self.input_directory.display()
        );

        Ok(paths
            .into_iter()
            .enumerate()
            .map(|(index, path)| DocumentJob::in_inbox(index, &self.input_directory, path))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scan_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let scanner = DirectoryScanner::new(temp_dir.path());

        let jobs = scanner.scan().unwrap();
        assert!(jobs.is_empty());
    }

    #[test]
    fn test_scan_with_documents() {
        let temp_dir = TempDir::new().unwrap();

        std::fs::write(temp_dir.path().join("doc1.pdf"), b"PDF content").unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), b"Text content").unwrap();
        std::fs::write(temp_dir.path().join("scan.PNG"), b"PNG content").unwrap();
        std::fs::write(temp_dir.path().join("unknown.xyz"), b"Unknown").unwrap();

        let scanner = DirectoryScanner::new(temp_dir.path());
        let jobs = scanner.scan().unwrap();

        let names: Vec<&str> = jobs.iter().map(|j| j.source_name.as_str()).collect();
        assert_eq!(names, vec!["doc1.pdf", "scan.PNG"]);
    }

    #[test]
    fn test_scan_recurses_in_sorted_order() {
        let temp_dir = TempDir::new().unwrap();

        let sub_dir = temp_dir.path().join("b-batch");
        std::fs::create_dir(&sub_dir).unwrap();
        std::fs::write(sub_dir.join("nested.pdf"), b"Nested").unwrap();
        std::fs::write(temp_dir.path().join("c.pdf"), b"C").unwrap();
        std::fs::write(temp_dir.path().join("a.pdf"), b"A").unwrap();

        let scanner = DirectoryScanner::new(temp_dir.path());
        let jobs = scanner.scan().unwrap();

        let names: Vec<&str> = jobs.iter().map(|j| j.source_name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b-batch/nested.pdf", "c.pdf"]);
        let indices: Vec<usize> = jobs.iter().map(|j| j.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_scan_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let scanner = DirectoryScanner::new(temp_dir.path().join("missing"));

        assert!(matches!(scanner.scan(), Err(WorkerError::ScanFailed { .. })));
    }
}
