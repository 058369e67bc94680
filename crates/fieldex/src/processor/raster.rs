use image::DynamicImage;

use crate::error::ProcessError;
use crate::processor::pdf::render_pdf_page;
use crate::processor::RasterSource;

/// Produces page images on demand.
pub trait PageRasterizer: Send + Sync {
    fn rasterize(&self, source: &RasterSource, dpi: u32) -> Result<DynamicImage, ProcessError>;
}

/// Reads image files directly and renders PDF pages through poppler.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileRasterizer;

impl PageRasterizer for FileRasterizer {
    fn rasterize(&self, source: &RasterSource, dpi: u32) -> Result<DynamicImage, ProcessError> {
        match source {
            RasterSource::ImageFile(path) => image::open(path).map_err(|e| {
                ProcessError::InvalidImage(format!("Failed to load {}: {}", path.display(), e))
            }),
            RasterSource::PdfPage { path, page_number } => {
                let png = render_pdf_page(path, *page_number, dpi)?;
                image::load_from_memory(&png).map_err(|e| {
                    ProcessError::InvalidImage(format!(
                        "Rendered page {} is not a valid image: {}",
                        page_number, e
                    ))
                })
            }
        }
    }
}
