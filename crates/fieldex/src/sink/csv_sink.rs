use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{SinkError, StorageError};
use crate::review::csv::UTF8_BOM;
use crate::sink::plan::HandoffPlan;
use crate::sink::{DownstreamSink, SinkReport};
use crate::storage::filesystem::{check_not_busy, ensure_directory};

/// Writes approved rows as an import-ready CSV. The file is always written,
/// header only when nothing is approved, so importers see a stable shape.
pub struct CsvHandoffSink {
    path: PathBuf,
}

impl CsvHandoffSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, plan: &HandoffPlan) -> Result<(), SinkError> {
        check_not_busy(&self.path)?;
        if let Some(parent) = self.path.parent() {
            ensure_directory(parent)?;
        }

        let write_err = |source| {
            SinkError::Storage(StorageError::WriteFile {
                path: self.path.clone(),
                source,
            })
        };
        let csv_err = |source| SinkError::Csv {
            path: self.path.clone(),
            source,
        };

        let mut file = File::create(&self.path).map_err(write_err)?;
        file.write_all(UTF8_BOM).map_err(write_err)?;

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(&plan.columns).map_err(csv_err)?;
        for row in &plan.approved {
            writer.write_record(&row.values).map_err(csv_err)?;
        }
        writer.flush().map_err(write_err)?;

        log::info!(
            "Wrote {} approved row(s) to {}",
            plan.approved.len(),
            crate::sanitize::redact_path(&self.path)
        );
        Ok(())
    }
}

impl DownstreamSink for CsvHandoffSink {
    fn name(&self) -> &str {
        "csv"
    }

    fn deliver(&self, plan: &HandoffPlan) -> Result<SinkReport, SinkError> {
        self.write(plan)?;
        Ok(SinkReport::all_consumed(plan, format!("written to {}", self.path.display())))
    }
}
