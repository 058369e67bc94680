pub mod image;
pub mod ocr;
pub mod pdf;
pub mod preprocess;
pub mod raster;
pub mod resolver;
pub mod text;

use std::path::{Path, PathBuf};

use crate::config::schema::DocumentFormat;
use crate::error::ProcessError;

pub use ocr::{BoundingBox, LineKey, OcrEngine, TesseractEngine, Token};
pub use preprocess::ImagePreprocessor;
pub use raster::{FileRasterizer, PageRasterizer};
pub use resolver::{PageOutcome, PageTextResolver, ResolvedPage, ResolverSettings, UnresolvedReason};
pub use text::WorkingText;

/// Where a page's working text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource {
    Embedded,
    Ocr,
}

impl TextSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedded => "EMBEDDED",
            Self::Ocr => "OCR",
        }
    }
}

/// Recipe for producing a page image on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RasterSource {
    ImageFile(PathBuf),
    PdfPage { path: PathBuf, page_number: u32 },
}

#[derive(Debug, Clone)]
pub struct Page {
    pub index: usize,
    pub embedded_text: String,
    pub raster: RasterSource,
}

#[derive(Debug, Clone)]
pub struct Document {
    /// File name of the source document, used as the record identifier.
    pub id: String,
    pub path: PathBuf,
    pub format: DocumentFormat,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn id_for(path: &Path) -> String {
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string()
    }
}

pub trait DocumentLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Document, ProcessError>;
    fn supports(&self, format: DocumentFormat) -> bool;
}

pub struct LoaderRegistry {
    loaders: Vec<Box<dyn DocumentLoader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self {
            loaders: vec![
                Box::new(pdf::PdfLoader::new()),
                Box::new(image::ImageLoader::new()),
            ],
        }
    }

    pub fn load(&self, path: &Path) -> Result<Document, ProcessError> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let format = DocumentFormat::from_extension(extension)
            .ok_or_else(|| ProcessError::UnsupportedFormat(extension.to_string()))?;

        for loader in &self.loaders {
            if loader.supports(format) {
                return loader.load(path);
            }
        }

        Err(ProcessError::UnsupportedFormat(extension.to_string()))
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
