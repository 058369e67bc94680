pub mod batch;
pub mod config;
pub mod context;
pub mod progress;
pub mod runner;

pub use batch::{build_records, run_batch};
pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use progress::{LogProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use runner::{Backends, Pipeline};

#[cfg(test)]
pub(crate) mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use super::*;
    use crate::config::schema::{FieldDefinition, FindStrategy};
    use crate::processor::pdf::tests::build_pdf;
    use crate::processor::resolver::tests::{BlankRasterizer, CountingOcr};

    fn keyword_line(name: &str, keyword: &str, required: bool) -> FieldDefinition {
        FieldDefinition {
            name: name.to_string(),
            find: FindStrategy::KeywordLine {
                keywords: vec![keyword.to_string()],
                ignore_case: true,
            },
            required,
        }
    }

    /// `case_id` (required, dedupe key) and `patient`, OCR backed by `ocr`.
    pub(crate) fn counting_pipeline(ocr: Arc<CountingOcr>) -> Pipeline {
        let mut config = PipelineConfig::with_fields(vec![
            keyword_line("case_id", "Case ID", true),
            keyword_line("patient", "Patient", false),
        ]);
        config.dedupe_key = vec!["case_id".to_string()];
        config.worker_count = 2;

        let backends = Backends::new(ocr, Arc::new(BlankRasterizer));
        Pipeline::from_config(Arc::new(config), &backends).unwrap()
    }

    pub(crate) fn text_pipeline() -> Pipeline {
        counting_pipeline(Arc::new(CountingOcr::new(&[])))
    }

    pub(crate) fn write_pdf(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, build_pdf(&[Some(text)])).unwrap();
        path
    }

    pub(crate) fn write_scanned_pdf(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, build_pdf(&[None])).unwrap();
        path
    }
}
