use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, warn};

use crate::config::schema::{LayoutMode, OcrConfig};
use crate::error::ProcessError;
use crate::processor::ocr::{OcrEngine, Token};
use crate::processor::pdf::has_usable_embedded_text;
use crate::processor::preprocess::ImagePreprocessor;
use crate::processor::raster::PageRasterizer;
use crate::processor::text::join_tokens;
use crate::processor::{Document, Page, TextSource};

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub ocr_enabled: bool,
    pub min_embedded_chars: usize,
    pub layout: LayoutMode,
    pub min_confidence: f32,
    pub dpi: u32,
}

impl ResolverSettings {
    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            ocr_enabled: config.enabled,
            min_embedded_chars: config.min_embedded_chars,
            layout: config.layout,
            min_confidence: config.min_confidence,
            dpi: config.dpi,
        }
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self::from_config(&OcrConfig::default())
    }
}

/// Why a page ended up with no working text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    InvalidImage,
    Rasterize,
    OcrUnavailable,
    OcrDisabled,
    TimedOut,
}

impl UnresolvedReason {
    fn from_error(error: &ProcessError) -> Self {
        match error {
            ProcessError::InvalidImage(_) => Self::InvalidImage,
            ProcessError::OcrUnavailable(_) => Self::OcrUnavailable,
            _ => Self::Rasterize,
        }
    }
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidImage => "invalid image",
            Self::Rasterize => "page could not be rendered",
            Self::OcrUnavailable => "OCR unavailable",
            Self::OcrDisabled => "OCR disabled",
            Self::TimedOut => "timed out",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Embedded,
    Ocr,
    Unresolved(UnresolvedReason),
}

/// A page after text resolution. The outcome is fixed once constructed.
#[derive(Debug, Clone)]
pub struct ResolvedPage {
    pub index: usize,
    pub outcome: PageOutcome,
    pub text: String,
    /// Present only when OCR ran.
    pub tokens: Vec<Token>,
}

impl ResolvedPage {
    fn unresolved(index: usize, reason: UnresolvedReason) -> Self {
        Self {
            index,
            outcome: PageOutcome::Unresolved(reason),
            text: String::new(),
            tokens: Vec::new(),
        }
    }

    pub fn source(&self) -> Option<TextSource> {
        match self.outcome {
            PageOutcome::Embedded => Some(TextSource::Embedded),
            PageOutcome::Ocr => Some(TextSource::Ocr),
            PageOutcome::Unresolved(_) => None,
        }
    }

    pub fn unresolved_reason(&self) -> Option<UnresolvedReason> {
        match self.outcome {
            PageOutcome::Unresolved(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Decides per page between the embedded text layer and OCR.
#[derive(Clone)]
pub struct PageTextResolver {
    preprocessor: ImagePreprocessor,
    ocr: Arc<dyn OcrEngine>,
    rasterizer: Arc<dyn PageRasterizer>,
    settings: ResolverSettings,
}

impl PageTextResolver {
    pub fn new(
        preprocessor: ImagePreprocessor,
        ocr: Arc<dyn OcrEngine>,
        rasterizer: Arc<dyn PageRasterizer>,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            preprocessor,
            ocr,
            rasterizer,
            settings,
        }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Resolves one page. Failures never propagate: they produce an
    /// unresolved page with empty text.
    pub fn resolve(&self, page: &Page, deadline: Option<Instant>) -> ResolvedPage {
        let _span = tracing::info_span!("resolve_page", page = page.index).entered();

        if has_usable_embedded_text(&page.embedded_text, self.settings.min_embedded_chars) {
            debug!("Page {} uses its embedded text", page.index);
            return ResolvedPage {
                index: page.index,
                outcome: PageOutcome::Embedded,
                text: page.embedded_text.clone(),
                tokens: Vec::new(),
            };
        }

        if !self.settings.ocr_enabled {
            return ResolvedPage::unresolved(page.index, UnresolvedReason::OcrDisabled);
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            warn!("Page {} skipped: run deadline passed", page.index);
            return ResolvedPage::unresolved(page.index, UnresolvedReason::TimedOut);
        }

        match self.recognize(page) {
            Ok(tokens) => {
                let (text, _) = join_tokens(&tokens, self.settings.min_confidence);
                ResolvedPage {
                    index: page.index,
                    outcome: PageOutcome::Ocr,
                    text,
                    tokens,
                }
            }
            Err(e) => {
                warn!("Page {} could not be recognized: {}", page.index, e);
                ResolvedPage::unresolved(page.index, UnresolvedReason::from_error(&e))
            }
        }
    }

    pub fn resolve_document(
        &self,
        document: &Document,
        deadline: Option<Instant>,
    ) -> Vec<ResolvedPage> {
        document
            .pages
            .iter()
            .map(|page| self.resolve(page, deadline))
            .collect()
    }

    fn recognize(&self, page: &Page) -> Result<Vec<Token>, ProcessError> {
        let image = self.rasterizer.rasterize(&page.raster, self.settings.dpi)?;
        let prepared = self.preprocessor.preprocess(&image)?;
        self.ocr.recognize(&prepared, self.settings.layout)
    }
}
