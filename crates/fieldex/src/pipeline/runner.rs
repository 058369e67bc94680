use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info_span, warn};

use crate::config::schema::OcrConfig;
use crate::error::{ConfigError, ProcessError};
use crate::extraction::FieldExtractor;
use crate::processor::{
    FileRasterizer, ImagePreprocessor, LoaderRegistry, OcrEngine, PageRasterizer,
    PageTextResolver, ResolvedPage, ResolverSettings, TesseractEngine, WorkingText,
};
use crate::sanitize;
use crate::worker::job::{DocumentJob, ExtractedDocument};

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::progress::{ProgressEvent, ProgressReporter};

/// The external pieces a pipeline talks to: the recognizer and the page renderer.
#[derive(Clone)]
pub struct Backends {
    pub ocr: Arc<dyn OcrEngine>,
    pub rasterizer: Arc<dyn PageRasterizer>,
}

impl Backends {
    pub fn new(ocr: Arc<dyn OcrEngine>, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        Self { ocr, rasterizer }
    }

    /// Tesseract for recognition, image files and poppler for rendering.
    pub fn tesseract(ocr: &OcrConfig) -> Self {
        Self {
            ocr: Arc::new(TesseractEngine::new(&ocr.languages, ocr.dpi)),
            rasterizer: Arc::new(FileRasterizer),
        }
    }
}

pub struct Pipeline {
    config: Arc<PipelineConfig>,
    loaders: LoaderRegistry,
    resolver: PageTextResolver,
    extractor: FieldExtractor,
}

impl Pipeline {
    pub fn from_config(config: Arc<PipelineConfig>, backends: &Backends) -> Result<Self, ConfigError> {
        let extractor = FieldExtractor::new(&config.fields)?;
        let resolver = PageTextResolver::new(
            ImagePreprocessor::new(&config.preprocess),
            Arc::clone(&backends.ocr),
            Arc::clone(&backends.rasterizer),
            ResolverSettings::from_config(&config.ocr),
        );

        Ok(Self {
            config,
            loaders: LoaderRegistry::new(),
            resolver,
            extractor,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.extractor.field_names()
    }

    /// Loads one file and resolves its pages, without extracting fields.
    pub fn resolve_file(&self, path: &Path) -> Result<Vec<ResolvedPage>, ProcessError> {
        let document = self.loaders.load(path)?;
        Ok(self.resolver.resolve_document(&document, None))
    }

    /// Runs every step for a single document. Never fails: problems are
    /// recorded on the result and every configured field gets a value or a
    /// `NOT_FOUND` diagnostic.
    pub fn run(&self, job: DocumentJob, progress: &dyn ProgressReporter) -> ExtractedDocument {
        let filename = sanitize::redact_path(&job.source_path);
        let _pipeline_span = info_span!("pipeline",
            job_id = %job.id,
            filename = %filename,
            path_hash = %sanitize::hash_path(&job.source_path),
        )
        .entered();

        progress.report(ProgressEvent::DocumentStarted {
            document: job.source_name.clone(),
        });

        let mut ctx = PipelineContext::new(job);

        // Step 1: Load document
        {
            let _step = info_span!("load_document").entered();
            self.step_load(&mut ctx);
        }

        // Step 2: Resolve page text
        {
            let _step = info_span!("resolve_pages").entered();
            self.step_resolve_pages(&mut ctx);
        }

        // Step 3: Assemble working text
        {
            let _step = info_span!("assemble_text").entered();
            ctx.working_text = WorkingText::assemble(&ctx.pages, self.config.ocr.min_confidence);
        }

        // Step 4: Extract fields
        {
            let _step = info_span!("extract").entered();
            ctx.extraction = Some(self.extractor.extract(&ctx.working_text));
        }

        progress.report(ProgressEvent::DocumentFinished {
            document: ctx.job.source_name.clone(),
            problems: ctx.problems.len(),
        });

        ExtractedDocument {
            job_id: ctx.job.id,
            index: ctx.job.index,
            source_path: ctx.job.source_path,
            source_name: ctx.job.source_name,
            extraction: ctx.extraction.unwrap_or_default(),
            pages: ctx.pages.iter().map(|p| p.outcome).collect(),
            problems: ctx.problems,
        }
    }

    fn step_load(&self, ctx: &mut PipelineContext) {
        match self.loaders.load(&ctx.job.source_path) {
            Ok(document) => {
                debug!("Loaded {} page(s)", document.pages.len());
                ctx.document = Some(document);
            }
            Err(e) => {
                warn!("Failed to load {}: {}", ctx.job.source_name, e);
                ctx.problems
                    .push(format!("{}: could not be read ({})", ctx.job.source_name, e));
            }
        }
    }

    fn step_resolve_pages(&self, ctx: &mut PipelineContext) {
        let Some(document) = &ctx.document else {
            return;
        };

        ctx.pages = self.resolver.resolve_document(document, ctx.job.deadline);

        for page in &ctx.pages {
            if let Some(reason) = page.unresolved_reason() {
                ctx.problems.push(format!(
                    "{} page {}: {}",
                    ctx.job.source_name,
                    page.index + 1,
                    reason
                ));
            }
        }
    }
}
