use std::time::Duration;

use crate::config::schema::{FieldDefinition, MappingConfig, OcrConfig, PreprocessConfig};

/// Run-wide settings handed to every worker. Read-only once built.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub fields: Vec<FieldDefinition>,
    pub dedupe_key: Vec<String>,
    pub ocr: OcrConfig,
    pub preprocess: PreprocessConfig,
    pub worker_count: usize,
    pub page_timeout: Option<Duration>,
}

impl PipelineConfig {
    pub fn from_config(config: &MappingConfig) -> Self {
        Self {
            fields: config.fields.clone(),
            dedupe_key: config.dedupe_key.clone(),
            ocr: config.ocr.clone(),
            preprocess: config.preprocess.clone(),
            worker_count: config.worker_count.max(1),
            page_timeout: config.page_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Fields only, everything else at its default. Mostly for tests and the
    /// single-file OCR command.
    pub fn with_fields(fields: Vec<FieldDefinition>) -> Self {
        Self {
            fields,
            dedupe_key: Vec::new(),
            ocr: OcrConfig::default(),
            preprocess: PreprocessConfig::default(),
            worker_count: 1,
            page_timeout: None,
        }
    }
}
