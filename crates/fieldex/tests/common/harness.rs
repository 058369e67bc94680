//! Test harness for isolated workflow runs.
//!
//! The `TestHarness` owns a temporary project directory laid out the way
//! `WorkflowService` expects, plus fake OCR backends so no test needs
//! Tesseract or poppler.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use fieldex::config::MappingConfig;
use fieldex::pipeline::{Backends, NoopProgress};
use fieldex::workflow::{ExtractionSummary, UploadSummary};
use fieldex::{WorkflowError, WorkflowService};

use super::builders::{pdf_bytes, FakeOcr, WhiteRasterizer};

/// One data row of a CSV file, keyed by header.
pub type CsvRow = HashMap<String, String>;

pub struct TestHarness {
    temp_dir: TempDir,
    pub service: WorkflowService,
    pub ocr: Arc<FakeOcr>,
}

impl TestHarness {
    /// A project with `mapping` as its config and an OCR backend that reads
    /// every scanned page as `ocr_words`.
    pub fn new(mapping: &str, ocr_words: &[(&str, f32)]) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let service = WorkflowService::new(temp_dir.path());
        service
            .ensure_directories()
            .expect("Failed to create project directories");

        let config_dir = temp_dir.path().join("config");
        std::fs::create_dir_all(&config_dir).expect("Failed to create config dir");
        std::fs::write(config_dir.join("mapping.yml"), mapping).expect("Failed to write config");

        Self {
            temp_dir,
            service,
            ocr: Arc::new(FakeOcr::new(ocr_words)),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.temp_dir.path().join(relative)
    }

    pub fn config(&self) -> MappingConfig {
        self.service.load_config().expect("Failed to load config")
    }

    pub fn backends(&self) -> Backends {
        Backends::new(self.ocr.clone(), Arc::new(WhiteRasterizer))
    }

    /// Writes a PDF into the inbox; `None` pages have no text layer.
    pub fn add_pdf(&self, relative: &str, pages: &[Option<&str>]) -> PathBuf {
        let path = self.service.inbox_dir().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create inbox subdirectory");
        }
        std::fs::write(&path, pdf_bytes(pages)).expect("Failed to write PDF");
        path
    }

    pub fn extract(&self) -> Result<ExtractionSummary, WorkflowError> {
        let config = self.config();
        self.service
            .extract_for_review(&config, &self.backends(), Arc::new(NoopProgress))
    }

    pub fn upload_csv_only(&self) -> Result<UploadSummary, WorkflowError> {
        let config = self.config();
        let sink = self.service.configured_sink(&config, true);
        self.service
            .upload(&config, sink.as_ref(), Arc::new(NoopProgress))
    }

    /// Reads a CSV below the project root into header-keyed rows.
    pub fn read_csv(&self, relative: &str) -> (Vec<String>, Vec<CsvRow>) {
        let mut reader = csv::Reader::from_path(self.path(relative)).expect("Failed to open CSV");
        let headers: Vec<String> = reader
            .headers()
            .expect("Failed to read headers")
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();
        let rows = reader
            .records()
            .map(|r| {
                let record = r.expect("Failed to read row");
                headers
                    .iter()
                    .cloned()
                    .zip(record.iter().map(str::to_string))
                    .collect()
            })
            .collect();
        (headers, rows)
    }

    /// Plays the reviewer: sets cells of the row for `document` in the
    /// review CSV and writes it back.
    pub fn edit_review(&self, document: &str, cells: &[(&str, &str)]) {
        let (headers, mut rows) = self.read_csv("output/review.csv");
        let row = rows
            .iter_mut()
            .find(|r| r.get("_source_pdf").map(String::as_str) == Some(document))
            .unwrap_or_else(|| panic!("No review row for {}", document));
        for (column, value) in cells {
            row.insert(column.to_string(), value.to_string());
        }

        let mut writer =
            csv::Writer::from_path(self.path("output/review.csv")).expect("Failed to rewrite CSV");
        writer.write_record(&headers).unwrap();
        for row in &rows {
            writer
                .write_record(headers.iter().map(|h| row.get(h).cloned().unwrap_or_default()))
                .unwrap();
        }
        writer.flush().unwrap();
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }
}
