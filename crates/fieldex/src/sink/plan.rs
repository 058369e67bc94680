use crate::config::schema::ColumnMap;
use crate::dedup::DedupDetector;
use crate::error::SinkError;
use crate::review::{ReviewStatus, ReviewedRow};

/// An approved row mapped onto destination columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedRow {
    pub source_document: String,
    /// Composite key of the row as the reviewer left it.
    pub dedupe_key: Option<String>,
    /// One value per destination column, in column map order.
    pub values: Vec<String>,
}

/// What the downstream sink gets to see: approved rows only, plus the
/// documents that are skipped this time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandoffPlan {
    pub columns: Vec<String>,
    pub approved: Vec<ApprovedRow>,
    /// Still `PENDING`; left for a future run.
    pub pending: Vec<String>,
    pub rejected: Vec<String>,
}

impl HandoffPlan {
    pub fn from_rows(
        rows: &[ReviewedRow],
        column_map: &ColumnMap,
        detector: &DedupDetector,
    ) -> Result<Self, SinkError> {
        let mut plan = HandoffPlan {
            columns: column_map.destinations().map(str::to_string).collect(),
            ..Default::default()
        };

        for row in rows {
            match row.status {
                ReviewStatus::Pending => plan.pending.push(row.source_document.clone()),
                ReviewStatus::Rejected => plan.rejected.push(row.source_document.clone()),
                ReviewStatus::Approved => {
                    let mut missing = Vec::new();
                    let values = column_map
                        .sources()
                        .map(|source| match row.get(source) {
                            Some(value) => value.to_string(),
                            None => {
                                missing.push(source);
                                String::new()
                            }
                        })
                        .collect();

                    if !missing.is_empty() {
                        return Err(SinkError::MissingColumns(missing.join(", ")));
                    }

                    plan.approved.push(ApprovedRow {
                        source_document: row.source_document.clone(),
                        dedupe_key: detector.key_from(|name| row.get(name)),
                        values,
                    });
                }
            }
        }

        Ok(plan)
    }

    pub fn has_approved(&self) -> bool {
        !self.approved.is_empty()
    }

    /// Drops approved rows matching `filed` and returns their documents.
    pub fn withdraw_approved<F>(&mut self, filed: F) -> Vec<String>
    where
        F: Fn(&ApprovedRow) -> bool,
    {
        let (withdrawn, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.approved).into_iter().partition(|row| filed(row));
        self.approved = kept;
        withdrawn.into_iter().map(|row| row.source_document).collect()
    }
}
