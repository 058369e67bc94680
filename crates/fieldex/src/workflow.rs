//! The two operator-facing phases: extract for review, then upload what
//! the reviewer approved.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use log::{info, warn};

use crate::config::{load_config_from_root, MappingConfig};
use crate::dedup::DedupDetector;
use crate::error::{SinkError, StorageError, WorkflowError};
use crate::pipeline::{run_batch, Backends, Pipeline, PipelineConfig, ProgressEvent, ProgressReporter};
use crate::review::{CsvReviewArtifact, ReviewArtifact, ReviewLayout, ReviewRecord};
use crate::sink::{
    Bucket, CommandSink, CsvHandoffSink, Disposition, DownstreamSink, HandoffPlan, SinkReport,
};
use crate::storage::{ensure_directory, ArchivedKeyStore, FileStorage};
use crate::worker::DirectoryScanner;

pub const INPUT_DIR: &str = "input";
pub const INBOX_DIR: &str = "input/inbox";
pub const ARCHIVE_DIR: &str = "input/archive";
pub const REJECTED_DIR: &str = "input/rejected";
pub const OUTPUT_DIR: &str = "output";
pub const LOGS_DIR: &str = "logs";

#[derive(Debug, Clone)]
pub struct ExtractionSummary {
    pub review_csv: PathBuf,
    pub access_ready_csv: PathBuf,
    pub records: Vec<ReviewRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct UploadSummary {
    pub access_ready_csv: PathBuf,
    pub log_path: PathBuf,
    pub approved_count: usize,
    pub pending_count: usize,
    pub moved_to_archive: Vec<PathBuf>,
    pub moved_to_rejected: Vec<PathBuf>,
    pub archived_keys_added: usize,
    /// Approved documents skipped because an earlier upload already filed them.
    pub already_filed: Vec<String>,
    pub success: bool,
    pub return_code: Option<i32>,
    pub error: Option<String>,
}

/// Runs both phases against a project directory:
///
/// ```text
/// <root>/config/mapping.yml
/// <root>/input/{inbox,archive,rejected}
/// <root>/output
/// <root>/logs
/// ```
pub struct WorkflowService {
    root: PathBuf,
}

impl WorkflowService {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn inbox_dir(&self) -> PathBuf {
        self.root.join(INBOX_DIR)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }

    pub fn ensure_directories(&self) -> Result<(), StorageError> {
        for relative in [INPUT_DIR, INBOX_DIR, ARCHIVE_DIR, REJECTED_DIR, OUTPUT_DIR, LOGS_DIR] {
            ensure_directory(&self.root.join(relative))?;
        }
        Ok(())
    }

    pub fn load_config(&self) -> Result<MappingConfig, WorkflowError> {
        Ok(load_config_from_root(&self.root)?)
    }

    pub fn review_csv_path(&self, config: &MappingConfig) -> PathBuf {
        self.output_dir().join(&config.output.review_csv)
    }

    pub fn access_ready_csv_path(&self, config: &MappingConfig) -> PathBuf {
        self.output_dir().join(&config.output.access_ready_csv)
    }

    /// Extracts every inbox document into the review CSV. The access-ready
    /// CSV is reset to its header so a stale hand-off is never re-imported.
    pub fn extract_for_review(
        &self,
        config: &MappingConfig,
        backends: &Backends,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<ExtractionSummary, WorkflowError> {
        let _span = tracing::info_span!("extract_for_review").entered();
        self.ensure_directories()?;

        let inbox = self.inbox_dir();
        let jobs = DirectoryScanner::new(&inbox).scan()?;
        if jobs.is_empty() {
            return Err(WorkflowError::NoInputFiles(inbox));
        }
        progress.report(ProgressEvent::Phase {
            message: format!("Found {} documents", jobs.len()),
        });

        let archived = ArchivedKeyStore::in_directory(self.output_dir()).load()?;
        let pipeline = Pipeline::from_config(Arc::new(PipelineConfig::from_config(config)), backends)?;
        let layout = ReviewLayout::new(pipeline.field_names());

        let records = run_batch(Arc::new(pipeline), jobs, &archived, Arc::clone(&progress))?;

        let review_csv = self.review_csv_path(config);
        CsvReviewArtifact::new(&review_csv).write(&records, &layout)?;

        let access_ready_csv = self.access_ready_csv_path(config);
        let header_only = HandoffPlan {
            columns: config
                .access
                .column_map
                .destinations()
                .map(str::to_string)
                .collect(),
            ..Default::default()
        };
        CsvHandoffSink::new(&access_ready_csv).write(&header_only)?;

        progress.report(ProgressEvent::Phase {
            message: format!("Review CSV written to: {}", review_csv.display()),
        });

        Ok(ExtractionSummary {
            review_csv,
            access_ready_csv,
            records,
        })
    }

    /// The sink configured for this project: the external import command
    /// when one is configured and `csv_only` is off, the plain CSV otherwise.
    pub fn configured_sink(&self, config: &MappingConfig, csv_only: bool) -> Box<dyn DownstreamSink> {
        let csv = CsvHandoffSink::new(self.access_ready_csv_path(config));
        match (&config.access.bulk_import, csv_only) {
            (Some(bulk_import), false) => {
                Box::new(CommandSink::new(csv, bulk_import.clone(), self.logs_dir()))
            }
            _ => Box::new(csv),
        }
    }

    /// Hands approved rows to `sink` and moves their source documents.
    ///
    /// A failed delivery is not an error here: it is reported on the summary
    /// and the approved documents go to the rejected bucket. Approved rows
    /// whose document already left the inbox were filed by an earlier
    /// upload and are not delivered again.
    pub fn upload(
        &self,
        config: &MappingConfig,
        sink: &dyn DownstreamSink,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<UploadSummary, WorkflowError> {
        let _span = tracing::info_span!("upload", sink = sink.name()).entered();

        let rows = CsvReviewArtifact::new(self.review_csv_path(config)).read()?;
        let detector = DedupDetector::new(config.dedupe_key.clone());
        let mut plan = HandoffPlan::from_rows(&rows, &config.access.column_map, &detector)?;
        if !plan.has_approved() {
            return Err(WorkflowError::NoApprovedRows);
        }

        let inbox = self.inbox_dir();
        let already_filed =
            plan.withdraw_approved(|row| !inbox.join(&row.source_document).exists());
        if !already_filed.is_empty() {
            info!(
                "Skipping {} approved row(s) filed by an earlier upload",
                already_filed.len()
            );
            if !plan.has_approved() {
                return Err(WorkflowError::AlreadyFiled(already_filed.len()));
            }
        }

        let mut messages = Vec::new();
        let mut record = |message: String| {
            progress.report(ProgressEvent::Phase {
                message: message.clone(),
            });
            messages.push(message);
        };

        record(format!(
            "Preparing import with {} approved rows ({} still pending)",
            plan.approved.len(),
            plan.pending.len()
        ));

        let mut summary = UploadSummary {
            access_ready_csv: self.access_ready_csv_path(config),
            approved_count: plan.approved.len(),
            pending_count: plan.pending.len(),
            already_filed,
            ..Default::default()
        };

        let (report, sink_log) = match sink.deliver(&plan) {
            Ok(report) => {
                summary.success = true;
                summary.return_code = report.return_code;
                record(format!("Import completed: {}", report.detail));
                let log_path = report.log_path.clone();
                (report, log_path)
            }
            Err(e) => {
                if let SinkError::CommandFailed { code, .. } = &e {
                    summary.return_code = *code;
                }
                summary.error = Some(e.to_string());
                record(format!("Import failed: {}", e));
                (
                    SinkReport::all_failed(&plan, e.to_string()),
                    e.log_path().map(Path::to_path_buf),
                )
            }
        };

        let storage = FileStorage::new(self.root.join(INPUT_DIR));
        for (document, bucket) in Disposition::plan(&plan, &report).moves {
            let source = inbox.join(&document);
            if !source.exists() {
                warn!("{} is no longer in the inbox; skipping", document);
                continue;
            }
            match storage.move_to_bucket(&source, bucket.directory()) {
                Ok(destination) => {
                    let label = match bucket {
                        Bucket::Archive => "ARCHIVED",
                        Bucket::Rejected => "REJECTED",
                    };
                    record(format!("{} {}", label, document));
                    match bucket {
                        Bucket::Archive => summary.moved_to_archive.push(destination),
                        Bucket::Rejected => summary.moved_to_rejected.push(destination),
                    }
                }
                Err(e) => record(format!("Failed to move {}: {}", document, e)),
            }
        }

        if summary.success {
            let consumed_keys = plan
                .approved
                .iter()
                .filter(|row| report.consumed.contains(&row.source_document))
                .filter_map(|row| row.dedupe_key.as_deref());
            summary.archived_keys_added =
                ArchivedKeyStore::in_directory(self.output_dir()).append(consumed_keys)?;
        }

        summary.log_path = sink_log.unwrap_or_else(|| {
            self.logs_dir().join(format!(
                "bulk_import_{}.log",
                Local::now().format("%Y%m%d_%H%M%S")
            ))
        });
        if let Err(e) = append_log(&summary.log_path, &messages) {
            warn!("Failed to write upload log: {}", e);
        }

        info!(
            "Upload finished: {} archived, {} rejected",
            summary.moved_to_archive.len(),
            summary.moved_to_rejected.len()
        );
        Ok(summary)
    }

    /// Verifies that the configured import command and database exist.
    pub fn check_sink(&self, config: &MappingConfig) -> Result<(), WorkflowError> {
        let bulk_import = config
            .access
            .bulk_import
            .as_ref()
            .ok_or(SinkError::NotConfigured)?;
        let sink = CommandSink::new(
            CsvHandoffSink::new(self.access_ready_csv_path(config)),
            bulk_import.clone(),
            self.logs_dir(),
        );
        Ok(sink.check()?)
    }
}

fn append_log(path: &Path, messages: &[String]) -> Result<(), StorageError> {
    if messages.is_empty() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let write_err = |source| StorageError::WriteFile {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(write_err)?;
    for message in messages {
        writeln!(file, "{}", message).map_err(write_err)?;
    }
    Ok(())
}
