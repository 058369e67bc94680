use std::path::Path;

use crate::config::schema::DocumentFormat;
use crate::error::ProcessError;
use crate::processor::{Document, DocumentLoader, Page, RasterSource};

/// A raster image file is a single page with no text layer; decoding is
/// left to the rasterizer so a corrupt file surfaces as an unresolved page.
pub struct ImageLoader;

impl ImageLoader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for ImageLoader {
    fn load(&self, path: &Path) -> Result<Document, ProcessError> {
        let _span = tracing::info_span!("processor.image").entered();

        std::fs::metadata(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(Document {
            id: Document::id_for(path),
            path: path.to_path_buf(),
            format: DocumentFormat::Image,
            pages: vec![Page {
                index: 0,
                embedded_text: String::new(),
                raster: RasterSource::ImageFile(path.to_path_buf()),
            }],
        })
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Image)
    }
}
