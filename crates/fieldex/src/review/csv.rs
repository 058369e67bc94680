use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{ReviewError, StorageError};
use crate::review::artifact::{ReviewArtifact, ReviewLayout, ReviewedRow};
use crate::review::columns;
use crate::review::record::{ReviewRecord, ReviewStatus};
use crate::storage::filesystem::{check_not_busy, ensure_directory};

/// Spreadsheet applications only detect UTF-8 with a byte order mark.
pub(crate) const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub(crate) fn bool_cell(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

/// Review artifact stored as a UTF-8 CSV file.
pub struct CsvReviewArtifact {
    path: PathBuf,
}

impl CsvReviewArtifact {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn csv_err(&self) -> impl Fn(csv::Error) -> ReviewError + '_ {
        move |source| ReviewError::Csv {
            path: self.path.clone(),
            source,
        }
    }

    fn write_err(&self) -> impl Fn(std::io::Error) -> ReviewError + '_ {
        move |source| {
            ReviewError::Storage(StorageError::WriteFile {
                path: self.path.clone(),
                source,
            })
        }
    }
}

fn row_for(record: &ReviewRecord, layout: &ReviewLayout) -> Vec<String> {
    let mut row = vec![
        record.document_id.clone(),
        bool_cell(record.extraction_ok).to_string(),
        record.dedupe.key.clone().unwrap_or_default(),
        bool_cell(record.is_duplicate()).to_string(),
        record.status.as_str().to_string(),
        record.comment.clone(),
        record.notes_text(),
    ];

    for name in &layout.field_names {
        row.push(
            record
                .extraction
                .value(name)
                .unwrap_or_default()
                .to_string(),
        );
    }
    for name in &layout.field_names {
        row.push(
            record
                .extraction
                .get(name)
                .map(|f| f.diagnostic.as_str())
                .unwrap_or_default()
                .to_string(),
        );
    }

    row
}

impl ReviewArtifact for CsvReviewArtifact {
    fn location(&self) -> &Path {
        &self.path
    }

    fn write(&self, records: &[ReviewRecord], layout: &ReviewLayout) -> Result<(), ReviewError> {
        check_not_busy(&self.path)?;
        if let Some(parent) = self.path.parent() {
            ensure_directory(parent)?;
        }

        let mut file = File::create(&self.path).map_err(self.write_err())?;
        file.write_all(UTF8_BOM).map_err(self.write_err())?;

        let mut writer = csv::Writer::from_writer(file);
        writer
            .write_record(columns::header(&layout.field_names))
            .map_err(self.csv_err())?;
        for record in records {
            writer
                .write_record(row_for(record, layout))
                .map_err(self.csv_err())?;
        }
        writer.flush().map_err(self.write_err())?;

        info!(
            "Wrote {} review row(s) to {}",
            records.len(),
            crate::sanitize::redact_path(&self.path)
        );
        Ok(())
    }

    fn read(&self) -> Result<Vec<ReviewedRow>, ReviewError> {
        if !self.path.exists() {
            return Err(ReviewError::MissingArtifact(self.path.clone()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)
            .map_err(self.csv_err())?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(self.csv_err())?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        for required in [columns::SOURCE_PDF, columns::REVIEW_STATUS] {
            if !headers.iter().any(|h| h == required) {
                return Err(ReviewError::MissingColumn {
                    path: self.path.clone(),
                    column: required.to_string(),
                });
            }
        }

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(self.csv_err())?;
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }

            let columns: BTreeMap<String, String> = headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.clone(), v.trim().to_string()))
                .collect();
            let cell = |name: &str| columns.get(name).cloned().unwrap_or_default();

            let row = index + 1;
            let status_cell = cell(columns::REVIEW_STATUS);
            let status = status_cell
                .parse::<ReviewStatus>()
                .map_err(|value| ReviewError::InvalidStatus { row, value })?;

            rows.push(ReviewedRow {
                row,
                source_document: cell(columns::SOURCE_PDF),
                status,
                comment: cell(columns::REVIEW_COMMENT),
                columns,
            });
        }

        Ok(rows)
    }
}
