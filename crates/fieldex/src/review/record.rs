use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::dedup::{DedupeFlag, DuplicateSource};
use crate::error::ReviewError;
use crate::extraction::ExtractionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// `PENDING` may move to either terminal state; terminal states never change.
    pub fn transition(self, to: ReviewStatus) -> Result<ReviewStatus, ReviewError> {
        if self == to || !self.is_terminal() {
            Ok(to)
        } else {
            Err(ReviewError::IllegalTransition {
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = String;

    /// Case-insensitive; a blank cell reads as `PENDING`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            _ => Err(s.trim().to_string()),
        }
    }
}

/// One row of the review artifact: what was extracted from a document and
/// whether a reviewer has signed off on it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRecord {
    /// Document path relative to the inbox; also the `_source_pdf` cell.
    pub document_id: String,
    pub source_path: PathBuf,
    pub extraction: ExtractionResult,
    pub dedupe: DedupeFlag,
    pub status: ReviewStatus,
    pub comment: String,
    pub notes: Vec<String>,
    /// No unresolved pages and no missing required field.
    pub extraction_ok: bool,
}

impl ReviewRecord {
    pub fn is_duplicate(&self) -> bool {
        self.dedupe.is_duplicate()
    }

    pub fn notes_text(&self) -> String {
        self.notes.join("; ")
    }

    pub fn set_status(&mut self, status: ReviewStatus) -> Result<(), ReviewError> {
        self.status = self.status.transition(status)?;
        Ok(())
    }
}

/// Builds the initial, always `PENDING`, record for a document.
pub struct ReviewRecordBuilder {
    document_id: String,
    source_path: PathBuf,
    extraction: ExtractionResult,
    dedupe: DedupeFlag,
    notes: Vec<String>,
    processing_ok: bool,
}

impl ReviewRecordBuilder {
    pub fn new(document_id: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        Self {
            document_id: document_id.into(),
            source_path: source_path.into(),
            extraction: ExtractionResult::default(),
            dedupe: DedupeFlag::default(),
            notes: Vec::new(),
            processing_ok: true,
        }
    }

    pub fn extraction(mut self, extraction: ExtractionResult) -> Self {
        self.extraction = extraction;
        self
    }

    pub fn dedupe(mut self, dedupe: DedupeFlag) -> Self {
        self.dedupe = dedupe;
        self
    }

    /// A processing problem (unreadable file, unresolved page) worth telling
    /// the reviewer about; marks the extraction as not ok.
    pub fn problem(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self.processing_ok = false;
        self
    }

    pub fn build(self) -> ReviewRecord {
        let mut notes = self.notes;

        let missing: Vec<&str> = self
            .extraction
            .missing_required()
            .map(|f| f.name.as_str())
            .collect();
        if !missing.is_empty() {
            notes.push(format!("Required field(s) not found: {}", missing.join(", ")));
        }

        let low: Vec<&str> = self
            .extraction
            .low_confidence()
            .map(|f| f.name.as_str())
            .collect();
        if !low.is_empty() {
            notes.push(format!("Low OCR confidence: {}", low.join(", ")));
        }

        match &self.dedupe.duplicate_of {
            Some(DuplicateSource::Batch { document }) => {
                notes.push(format!("Possible duplicate of {}", document));
            }
            Some(DuplicateSource::Archived) => {
                notes.push("Possible duplicate of an archived record".to_string());
            }
            None => {}
        }

        ReviewRecord {
            extraction_ok: self.processing_ok && missing.is_empty(),
            document_id: self.document_id,
            source_path: self.source_path,
            extraction: self.extraction,
            dedupe: self.dedupe,
            status: ReviewStatus::Pending,
            comment: String::new(),
            notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{FieldDiagnostic, FieldValue};

    fn extraction(diagnostic: FieldDiagnostic, required: bool) -> ExtractionResult {
        ExtractionResult {
            fields: vec![FieldValue {
                name: "case_id".to_string(),
                value: if diagnostic == FieldDiagnostic::NotFound {
                    String::new()
                } else {
                    "4521".to_string()
                },
                diagnostic,
                required,
            }],
        }
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("approved".parse::<ReviewStatus>(), Ok(ReviewStatus::Approved));
        assert_eq!(" Rejected ".parse::<ReviewStatus>(), Ok(ReviewStatus::Rejected));
        assert_eq!("".parse::<ReviewStatus>(), Ok(ReviewStatus::Pending));
        assert_eq!("maybe".parse::<ReviewStatus>(), Err("maybe".to_string()));
    }

    #[test]
    fn test_transitions() {
        assert_eq!(
            ReviewStatus::Pending.transition(ReviewStatus::Approved).unwrap(),
            ReviewStatus::Approved
        );
        assert_eq!(
            ReviewStatus::Pending.transition(ReviewStatus::Rejected).unwrap(),
            ReviewStatus::Rejected
        );
        assert_eq!(
            ReviewStatus::Approved.transition(ReviewStatus::Approved).unwrap(),
            ReviewStatus::Approved
        );
        assert!(matches!(
            ReviewStatus::Approved.transition(ReviewStatus::Pending),
            Err(ReviewError::IllegalTransition { .. })
        ));
        assert!(ReviewStatus::Rejected
            .transition(ReviewStatus::Approved)
            .is_err());
    }

    #[test]
    fn test_new_record_is_pending() {
        let record = ReviewRecordBuilder::new("a.pdf", "/inbox/a.pdf")
            .extraction(extraction(FieldDiagnostic::Matched, true))
            .build();

        assert_eq!(record.status, ReviewStatus::Pending);
        assert!(record.extraction_ok);
        assert!(record.notes.is_empty());
    }

    #[test]
    fn test_missing_required_still_builds_record() {
        let record = ReviewRecordBuilder::new("a.pdf", "/inbox/a.pdf")
            .extraction(extraction(FieldDiagnostic::NotFound, true))
            .build();

        assert_eq!(record.status, ReviewStatus::Pending);
        assert!(!record.extraction_ok);
        assert_eq!(record.notes_text(), "Required field(s) not found: case_id");
    }

    #[test]
    fn test_problem_and_duplicate_notes() {
        let record = ReviewRecordBuilder::new("b.pdf", "/inbox/b.pdf")
            .extraction(extraction(FieldDiagnostic::LowConfidence, false))
            .dedupe(DedupeFlag {
                key: Some("4521".to_string()),
                duplicate_of: Some(DuplicateSource::Batch {
                    document: "a.pdf".to_string(),
                }),
            })
            .problem("b.pdf page 2: OCR unavailable")
            .build();

        assert!(!record.extraction_ok);
        assert!(record.is_duplicate());
        assert_eq!(
            record.notes,
            vec![
                "b.pdf page 2: OCR unavailable".to_string(),
                "Low OCR confidence: case_id".to_string(),
                "Possible duplicate of a.pdf".to_string(),
            ]
        );
    }

    #[test]
    fn test_record_status_cannot_be_reversed() {
        let mut record = ReviewRecordBuilder::new("a.pdf", "/inbox/a.pdf").build();
        record.set_status(ReviewStatus::Rejected).unwrap();
        assert!(record.set_status(ReviewStatus::Pending).is_err());
        assert_eq!(record.status, ReviewStatus::Rejected);
    }
}
