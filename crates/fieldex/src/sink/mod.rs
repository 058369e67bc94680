//! Hand-off of approved records to the downstream store, and the resulting
//! disposition of their source documents.

pub mod command;
pub mod csv_sink;
pub mod plan;

use std::path::PathBuf;

use crate::error::SinkError;

pub use command::CommandSink;
pub use csv_sink::CsvHandoffSink;
pub use plan::{ApprovedRow, HandoffPlan};

/// Where a source document goes after an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Archive,
    Rejected,
}

impl Bucket {
    pub fn directory(&self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkReport {
    /// Source documents whose rows the sink accepted.
    pub consumed: Vec<String>,
    pub failed: Vec<String>,
    pub detail: String,
    pub return_code: Option<i32>,
    pub log_path: Option<PathBuf>,
}

impl SinkReport {
    pub fn all_consumed(plan: &HandoffPlan, detail: impl Into<String>) -> Self {
        Self {
            consumed: plan
                .approved
                .iter()
                .map(|r| r.source_document.clone())
                .collect(),
            detail: detail.into(),
            ..Default::default()
        }
    }

    pub fn all_failed(plan: &HandoffPlan, detail: impl Into<String>) -> Self {
        Self {
            failed: plan
                .approved
                .iter()
                .map(|r| r.source_document.clone())
                .collect(),
            detail: detail.into(),
            ..Default::default()
        }
    }
}

/// Consumer of approved, mapped rows.
pub trait DownstreamSink {
    fn name(&self) -> &str;

    /// Delivers every approved row. An `Err` means nothing was consumed.
    fn deliver(&self, plan: &HandoffPlan) -> Result<SinkReport, SinkError>;
}

/// Which source documents move to which bucket. Computed here, applied by
/// the file-system collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Disposition {
    pub moves: Vec<(String, Bucket)>,
}

impl Disposition {
    /// Consumed rows are archived, failed ones rejected, and rows the
    /// reviewer rejected go to the rejected bucket too. Pending rows stay.
    pub fn plan(plan: &HandoffPlan, report: &SinkReport) -> Self {
        let mut moves: Vec<(String, Bucket)> = Vec::new();
        moves.extend(report.consumed.iter().map(|d| (d.clone(), Bucket::Archive)));
        moves.extend(report.failed.iter().map(|d| (d.clone(), Bucket::Rejected)));
        moves.extend(plan.rejected.iter().map(|d| (d.clone(), Bucket::Rejected)));
        moves.retain(|(d, _)| !d.is_empty());
        Self { moves }
    }

    pub fn documents_in(&self, bucket: Bucket) -> impl Iterator<Item = &str> {
        self.moves
            .iter()
            .filter(move |(_, b)| *b == bucket)
            .map(|(d, _)| d.as_str())
    }
}
