use std::path::Path;
use std::process::Command;

use tracing::warn;

use crate::config::schema::DocumentFormat;
use crate::error::ProcessError;
use crate::processor::{Document, DocumentLoader, Page, RasterSource};

/// Loads PDF pages with their embedded text. Rendering is deferred to the
/// rasterizer so pages with usable text never touch poppler.
pub struct PdfLoader;

impl PdfLoader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for PdfLoader {
    fn load(&self, path: &Path) -> Result<Document, ProcessError> {
        let _span = tracing::info_span!("processor.pdf").entered();

        let pdf_bytes = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        let pages = match lopdf::Document::load_mem(&pdf_bytes) {
            Ok(doc) => embedded_pages(&doc, path),
            Err(e) => {
                // lopdf rejects some files poppler still renders (e.g. broken
                // cross-reference tables); every page then goes through OCR.
                warn!(
                    "lopdf failed to parse {}: {}. Pages will be recognized from images.",
                    path.display(),
                    e
                );
                let page_count = count_pdf_pages(path)?;
                (1..=page_count)
                    .map(|page_number| Page {
                        index: (page_number - 1) as usize,
                        embedded_text: String::new(),
                        raster: RasterSource::PdfPage {
                            path: path.to_path_buf(),
                            page_number,
                        },
                    })
                    .collect()
            }
        };

        Ok(Document {
            id: Document::id_for(path),
            path: path.to_path_buf(),
            format: DocumentFormat::Pdf,
            pages,
        })
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Pdf)
    }
}

fn embedded_pages(doc: &lopdf::Document, path: &Path) -> Vec<Page> {
    doc.get_pages()
        .keys()
        .enumerate()
        .map(|(index, &page_number)| {
            // A page whose text layer cannot be decoded is treated as scanned.
            let embedded_text = doc.extract_text(&[page_number]).unwrap_or_default();
            Page {
                index,
                embedded_text,
                raster: RasterSource::PdfPage {
                    path: path.to_path_buf(),
                    page_number,
                },
            }
        })
        .collect()
}

/// Get the page count of a PDF using pdfinfo (poppler-utils).
fn count_pdf_pages(path: &Path) -> Result<u32, ProcessError> {
    let output = Command::new("pdfinfo").arg(path).output().map_err(|e| {
        ProcessError::PdfProcessing(format!(
            "Failed to load PDF and failed to run pdfinfo: {}. Make sure poppler-utils is installed.",
            e
        ))
    })?;

    if !output.status.success() {
        return Err(ProcessError::PdfProcessing(format!(
            "Failed to load PDF: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_pdfinfo_pages(&stdout).unwrap_or(1))
}

fn parse_pdfinfo_pages(stdout: &str) -> Option<u32> {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|count| count.trim().parse::<u32>().ok())
}

/// Marker lopdf emits for glyphs in CID fonts it cannot decode.
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

/// Below this many characters the alphanumeric ratio check is skipped.
const MIN_TOTAL_CHARS: usize = 50;

/// Text with a smaller share of alphanumeric characters is considered garbled.
const MIN_ALPHANUMERIC_PERCENT: usize = 10;

/// Whether a page's embedded text can be used as-is instead of running OCR.
///
/// Text counts as usable when, after dropping decoding markers, it has at
/// least `min_chars` letters or digits and is not mostly symbols. Form
/// outlines drawn with underscores and pipes never count.
pub fn has_usable_embedded_text(text: &str, min_chars: usize) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }

    let cleaned = trimmed.replace(IDENTITY_H_PATTERN, "");
    let significant = cleaned.chars().filter(|c| c.is_alphanumeric()).count();
    if significant == 0 || significant < min_chars {
        return false;
    }

    let total_chars = trimmed.chars().count();
    let alphanumeric_chars = trimmed.chars().filter(|c| c.is_alphanumeric()).count();
    if total_chars > MIN_TOTAL_CHARS
        && alphanumeric_chars * 100 < total_chars * MIN_ALPHANUMERIC_PERCENT
    {
        return false;
    }

    true
}

/// Renders a single PDF page to PNG bytes with pdftoppm.
pub fn render_pdf_page(path: &Path, page_number: u32, dpi: u32) -> Result<Vec<u8>, ProcessError> {
    let temp_dir = std::env::temp_dir();
    let output_prefix = temp_dir.join(format!("fieldex_page_{}", uuid::Uuid::new_v4()));

    let output = Command::new("pdftoppm")
        .arg("-png")
        .args(["-r", &dpi.to_string()])
        .args(["-f", &page_number.to_string()])
        .args(["-l", &page_number.to_string()])
        .arg(path)
        .arg(&output_prefix)
        .output()
        .map_err(|e| {
            ProcessError::Rasterize(format!(
                "Failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
                e
            ))
        })?;

    if !output.status.success() {
        return Err(ProcessError::Rasterize(format!(
            "pdftoppm failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    // pdftoppm zero-pads the page suffix depending on the document's page count.
    let candidates = [
        format!("{}-{}.png", output_prefix.display(), page_number),
        format!("{}-{:02}.png", output_prefix.display(), page_number),
        format!("{}-{:03}.png", output_prefix.display(), page_number),
    ];
    let image_path = candidates
        .iter()
        .find(|p| Path::new(p).exists())
        .ok_or_else(|| ProcessError::Rasterize("Failed to find rendered page image".to_string()))?;

    let image_data = std::fs::read(image_path)
        .map_err(|e| ProcessError::Rasterize(format!("Failed to read rendered image: {}", e)))?;

    let _ = std::fs::remove_file(image_path);

    Ok(image_data)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::{dictionary, Object, Stream};
    use tempfile::NamedTempFile;

    /// Builds a PDF with one page per entry; `None` produces a page without a text layer.
    pub(crate) fn build_pdf(pages: &[Option<&str>]) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids = Vec::new();
        for text in pages {
            let content = match text {
                Some(text) => format!("BT /F1 12 Tf 50 700 Td ({}) Tj ET", text),
                None => String::new(),
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => resources_id,
                "Contents" => content_id,
            });
            kids.push(Object::from(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut pdf_bytes = Vec::new();
        doc.save_to(&mut pdf_bytes).unwrap();
        pdf_bytes
    }

    #[test]
    fn test_supports_pdf_format() {
        let loader = PdfLoader::new();
        assert!(loader.supports(DocumentFormat::Pdf));
        assert!(!loader.supports(DocumentFormat::Image));
    }

    #[test]
    fn test_load_pdf_with_embedded_text() {
        let temp_file = NamedTempFile::with_suffix(".pdf").unwrap();
        std::fs::write(temp_file.path(), build_pdf(&[Some("Case ID: 4521")])).unwrap();

        let document = PdfLoader::new().load(temp_file.path()).unwrap();

        assert_eq!(document.format, DocumentFormat::Pdf);
        assert_eq!(document.pages.len(), 1);
        assert!(document.pages[0].embedded_text.contains("Case ID: 4521"));
        assert_eq!(
            document.pages[0].raster,
            RasterSource::PdfPage {
                path: temp_file.path().to_path_buf(),
                page_number: 1
            }
        );
    }

    #[test]
    fn test_load_pdf_keeps_page_order() {
        let temp_file = NamedTempFile::with_suffix(".pdf").unwrap();
        std::fs::write(temp_file.path(), build_pdf(&[Some("First"), None, Some("Third")]))
            .unwrap();

        let document = PdfLoader::new().load(temp_file.path()).unwrap();

        assert_eq!(document.pages.len(), 3);
        assert_eq!(
            document.pages.iter().map(|p| p.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(document.pages[0].embedded_text.contains("First"));
        assert!(document.pages[1].embedded_text.trim().is_empty());
        assert!(document.pages[2].embedded_text.contains("Third"));
    }

    #[test]
    fn test_pdf_file_not_found_error() {
        match PdfLoader::new().load(Path::new("/nonexistent/file.pdf")) {
            Err(ProcessError::ReadDocument { path, .. }) => {
                assert_eq!(path, Path::new("/nonexistent/file.pdf"));
            }
            other => panic!("Expected ReadDocument error, got {:?}", other),
        }
    }

    #[test]
    fn test_usable_text_requires_minimum_characters() {
        assert!(!has_usable_embedded_text("", 5));
        assert!(!has_usable_embedded_text("  \n\t  ", 5));
        assert!(!has_usable_embedded_text("|  -", 5));
        assert!(!has_usable_embedded_text("a b c d", 5));
        assert!(has_usable_embedded_text("Case ID: 4521", 5));
        assert!(has_usable_embedded_text("x", 1));
    }

    #[test]
    fn test_form_outline_is_not_text() {
        assert!(!has_usable_embedded_text("______________ | ______________", 5));
        assert!(!has_usable_embedded_text("[____] [____] ----- |||||", 5));
        assert!(!has_usable_embedded_text("No: ____", 5));
    }

    #[test]
    fn test_identity_h_markers_are_not_text() {
        let text = "?Identity-H Unimplemented? ?Identity-H Unimplemented?";
        assert!(!has_usable_embedded_text(text, 5));
    }

    #[test]
    fn test_garbled_text_is_not_usable() {
        let garbled = "!@#$%^&*(){}[]|\\:\";<>?,./~`!@#$%^&*(){}[]|\\:\";<>?,./~`!!";
        assert!(garbled.chars().count() > MIN_TOTAL_CHARS);
        assert!(!has_usable_embedded_text(garbled, 5));

        let mut borderline = String::from("abcdef");
        borderline.push_str(&"!".repeat(45));
        assert!(has_usable_embedded_text(&borderline, 5));
    }

    #[test]
    fn test_parse_pdfinfo_pages() {
        let stdout = "Producer:       test\nPages:          12\nEncrypted:      no\n";
        assert_eq!(parse_pdfinfo_pages(stdout), Some(12));
        assert_eq!(parse_pdfinfo_pages("Title: nothing here"), None);
    }
}
