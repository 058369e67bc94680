use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ReviewError;
use crate::review::record::{ReviewRecord, ReviewStatus};

/// Field columns written to the review artifact, in configured order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewLayout {
    pub field_names: Vec<String>,
}

impl ReviewLayout {
    pub fn new<I, S>(field_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field_names: field_names.into_iter().map(Into::into).collect(),
        }
    }
}

/// A row read back from the review artifact after the reviewer edited it.
/// Cell values are whatever the reviewer left there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewedRow {
    /// 1-based data row number, for error messages.
    pub row: usize,
    pub source_document: String,
    pub status: ReviewStatus,
    pub comment: String,
    pub columns: BTreeMap<String, String>,
}

impl ReviewedRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }
}

/// The tabular file through which reviewers approve, reject or correct records.
pub trait ReviewArtifact {
    fn location(&self) -> &Path;

    fn write(&self, records: &[ReviewRecord], layout: &ReviewLayout) -> Result<(), ReviewError>;

    fn read(&self) -> Result<Vec<ReviewedRow>, ReviewError>;
}
