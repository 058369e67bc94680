pub mod config;
pub mod dedup;
pub mod error;
pub mod extraction;
pub mod pipeline;
pub mod processor;
pub mod review;
pub mod sanitize;
pub mod sink;
pub mod storage;
pub mod telemetry;
pub mod worker;
pub mod workflow;

pub use config::{load_config, load_config_from_root, DocumentFormat, MappingConfig};
pub use dedup::{DedupDetector, DedupeFlag};
pub use error::{
    ConfigError, FieldexError, ProcessError, Result, ReviewError, SinkError, StorageError,
    WorkerError, WorkflowError,
};
pub use extraction::{ExtractionResult, FieldDiagnostic, FieldExtractor};
pub use pipeline::{Backends, LogProgress, Pipeline, PipelineConfig, ProgressReporter};
pub use review::{CsvReviewArtifact, ReviewArtifact, ReviewRecord, ReviewStatus};
pub use sink::{CommandSink, CsvHandoffSink, DownstreamSink, HandoffPlan};
pub use workflow::{ExtractionSummary, UploadSummary, WorkflowService};
