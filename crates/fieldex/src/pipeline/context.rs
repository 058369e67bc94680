use crate::extraction::ExtractionResult;
use crate::processor::{Document, ResolvedPage, WorkingText};
use crate::worker::job::DocumentJob;

pub struct PipelineContext {
    // Input
    pub job: DocumentJob,

    // Step 1 result, None when the file could not be loaded
    pub document: Option<Document>,

    // Step 2 result
    pub pages: Vec<ResolvedPage>,

    // Step 3 result
    pub working_text: WorkingText,

    // Step 4 result, guaranteed Some after step_extract
    pub extraction: Option<ExtractionResult>,

    // Problems worth a note on the review record
    pub problems: Vec<String>,
}

impl PipelineContext {
    pub fn new(job: DocumentJob) -> Self {
        Self {
            job,
            document: None,
            pages: Vec::new(),
            working_text: WorkingText::default(),
            extraction: None,
            problems: Vec::new(),
        }
    }
}
