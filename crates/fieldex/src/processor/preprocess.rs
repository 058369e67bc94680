use std::io::Cursor;

use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::median_filter;
use imageproc::integral_image::integral_image;

use crate::config::schema::PreprocessConfig;
use crate::error::ProcessError;

/// Normalizes a rasterized page for recognition: grayscale, median denoise,
/// then a local mean-minus-offset threshold that yields a black/white image.
#[derive(Debug, Clone, Copy)]
pub struct ImagePreprocessor {
    denoise_radius: u32,
    block_radius: u32,
    offset: i32,
}

impl ImagePreprocessor {
    pub fn new(config: &PreprocessConfig) -> Self {
        Self {
            denoise_radius: config.denoise_radius,
            block_radius: config.threshold_block_radius.max(1),
            offset: config.threshold_offset,
        }
    }

    pub fn preprocess(&self, image: &DynamicImage) -> Result<GrayImage, ProcessError> {
        let _span = tracing::info_span!(
            "processor.preprocess",
            width = image.width(),
            height = image.height()
        )
        .entered();

        if image.width() == 0 || image.height() == 0 {
            return Err(ProcessError::InvalidImage(format!(
                "image has no pixels ({}x{})",
                image.width(),
                image.height()
            )));
        }

        let gray = image.to_luma8();
        let denoised = if self.denoise_radius > 0 {
            median_filter(&gray, self.denoise_radius, self.denoise_radius)
        } else {
            gray
        };

        Ok(self.threshold(&denoised))
    }

    /// Decodes raw image bytes and preprocesses them.
    pub fn preprocess_bytes(&self, data: &[u8]) -> Result<GrayImage, ProcessError> {
        let image = image::load_from_memory(data)
            .map_err(|e| ProcessError::InvalidImage(format!("Failed to decode image: {}", e)))?;
        self.preprocess(&image)
    }

    fn threshold(&self, image: &GrayImage) -> GrayImage {
        let (width, height) = image.dimensions();
        // u64 sums: a u32 table overflows on large high-DPI scans.
        let integral = integral_image::<_, u64>(image);
        let r = self.block_radius;

        GrayImage::from_fn(width, height, |x, y| {
            let left = x.saturating_sub(r);
            let top = y.saturating_sub(r);
            let right = (x + r).min(width - 1);
            let bottom = (y + r).min(height - 1);

            // The integral image is one pixel larger than the source in each
            // dimension; entry (x, y) holds the sum of the rectangle above-left of it.
            let sum = integral.get_pixel(right + 1, bottom + 1).0[0]
                + integral.get_pixel(left, top).0[0]
                - integral.get_pixel(left, bottom + 1).0[0]
                - integral.get_pixel(right + 1, top).0[0];
            let count = u64::from((right - left + 1) * (bottom - top + 1));
            let mean = (sum / count) as i64;

            let value = i64::from(image.get_pixel(x, y).0[0]);
            if value > mean - i64::from(self.offset) {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        })
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(&PreprocessConfig::default())
    }
}

/// Encodes a grayscale image as PNG, the format the recognizer is fed.
pub fn encode_png(image: &GrayImage) -> Result<Vec<u8>, ProcessError> {
    let mut png_data = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png_data), image::ImageFormat::Png)
        .map_err(|e| ProcessError::InvalidImage(format!("Failed to encode image: {}", e)))?;
    Ok(png_data)
}
