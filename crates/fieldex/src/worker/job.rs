use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::extraction::ExtractionResult;
use crate::processor::PageOutcome;

/// One document queued for extraction.
#[derive(Debug, Clone)]
pub struct DocumentJob {
    pub id: String,
    /// Position in the batch; results are put back in this order.
    pub index: usize,
    pub source_path: PathBuf,
    /// Path relative to the inbox, used as the record identifier.
    pub source_name: String,
    /// Run-level deadline shared by every job of a batch.
    pub deadline: Option<Instant>,
}

impl DocumentJob {
    pub fn new(index: usize, source_path: PathBuf, source_name: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            index,
            source_path,
            source_name,
            deadline: None,
        }
    }

    /// Builds a job whose name is `source_path` relative to `inbox`, with
    /// forward slashes so the review file reads the same on every platform.
    pub fn in_inbox(index: usize, inbox: &Path, source_path: PathBuf) -> Self {
        let source_name = source_path
            .strip_prefix(inbox)
            .unwrap_or(&source_path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        Self::new(index, source_path, source_name)
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }
}

/// What the pipeline produced for one job. Always produced, even when the
/// document could not be read: the problems end up in the review notes.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub job_id: String,
    pub index: usize,
    pub source_path: PathBuf,
    pub source_name: String,
    pub extraction: ExtractionResult,
    pub pages: Vec<PageOutcome>,
    pub problems: Vec<String>,
}

impl ExtractedDocument {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}
