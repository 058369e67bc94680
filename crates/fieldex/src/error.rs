use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FieldexError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Review error: {0}")]
    Review(#[from] ReviewError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Field '{field}' uses unknown strategy type '{kind}'")]
    UnknownStrategy { field: String, kind: String },

    #[error("Duplicate field name '{name}'")]
    DuplicateField { name: String },

    #[error("Invalid pattern for field '{field}': {reason}")]
    InvalidPattern { field: String, reason: String },

    #[error("{context} references unknown column '{name}'")]
    UnknownField { context: String, name: String },
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("Failed to rasterize page: {0}")]
    Rasterize(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("OCR backend unavailable: {0}")]
    OcrUnavailable(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from '{from}' to '{to}': {source}")]
    MoveFile {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),

    #[error("'{path}' is in use by another process ({reason}); close it and retry")]
    ResourceBusy { path: PathBuf, reason: String },
}

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Review artifact not found at '{0}'")]
    MissingArtifact(PathBuf),

    #[error("Failed to read or write review CSV '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("'{path}' is missing the {column} column")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Row {row}: invalid review status '{value}'")]
    InvalidStatus { row: usize, value: String },

    #[error("Review status cannot change from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Approved rows are missing required columns: {0}")]
    MissingColumns(String),

    #[error("Failed to write hand-off file '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Import command not found: {0}")]
    CommandNotFound(PathBuf),

    #[error("Target database not found: {0}")]
    DatabaseNotFound(PathBuf),

    #[error("No bulk import command is configured")]
    NotConfigured,

    #[error("Import command failed with exit code {code:?}: {stderr}")]
    CommandFailed {
        code: Option<i32>,
        stderr: String,
        log_path: Option<PathBuf>,
    },

    #[error("Import command timed out after {seconds} seconds")]
    Timeout {
        seconds: u64,
        log_path: Option<PathBuf>,
    },

    #[error("I/O error during import: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SinkError {
    /// Log the failed import command wrote to, if it got that far.
    pub fn log_path(&self) -> Option<&Path> {
        match self {
            SinkError::CommandFailed { log_path, .. } | SinkError::Timeout { log_path, .. } => {
                log_path.as_deref()
            }
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Directory scan failed for '{path}': {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Expected {expected} document results, received {received}")]
    IncompleteBatch { expected: usize, received: usize },
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("No documents found in {0}")]
    NoInputFiles(PathBuf),

    #[error("No APPROVED rows found; mark rows APPROVED in the review file before uploading")]
    NoApprovedRows,

    #[error("All {0} APPROVED row(s) were filed by an earlier upload; nothing left to import")]
    AlreadyFiled(usize),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

pub type Result<T> = std::result::Result<T, FieldexError>;
