use std::sync::Arc;

use image::GrayImage;

use crate::config::schema::LayoutMode;
use crate::error::ProcessError;
use crate::processor::preprocess::encode_png;

/// Tesseract's TSV level for word rows.
const WORD_LEVEL: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Identifies the recognizer's text line a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LineKey {
    pub block: u32,
    pub paragraph: u32,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    pub bbox: BoundingBox,
    /// Backend confidence, 0-100, passed through unmodified.
    pub confidence: f32,
    /// Reading-order index, strictly increasing within a page.
    pub order: usize,
    pub line: LineKey,
}

impl Token {
    pub fn is_low_confidence(&self, threshold: f32) -> bool {
        self.confidence < threshold
    }
}

/// Tokens below `threshold`. Nothing is discarded; this is a view for diagnostics.
pub fn low_confidence_tokens(tokens: &[Token], threshold: f32) -> Vec<&Token> {
    tokens
        .iter()
        .filter(|t| t.is_low_confidence(threshold))
        .collect()
}

/// A text-recognition backend.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &GrayImage, layout: LayoutMode) -> Result<Vec<Token>, ProcessError>;
}

/// Tesseract through leptess. A fresh `LepTess` is created per call so the
/// engine can be shared across worker threads.
#[derive(Clone)]
pub struct TesseractEngine {
    inner: Arc<TesseractEngineInner>,
}

struct TesseractEngineInner {
    languages: String,
    dpi: u32,
}

impl TesseractEngine {
    pub fn new(languages: &[String], dpi: u32) -> Self {
        let lang_str = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };

        Self {
            inner: Arc::new(TesseractEngineInner {
                languages: lang_str,
                dpi,
            }),
        }
    }

    pub fn languages(&self) -> &str {
        &self.inner.languages
    }

    pub fn dpi(&self) -> u32 {
        self.inner.dpi
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &GrayImage, layout: LayoutMode) -> Result<Vec<Token>, ProcessError> {
        let _span = tracing::info_span!(
            "processor.ocr",
            psm = layout.page_seg_mode(),
            languages = %self.inner.languages
        )
        .entered();

        let png_data = encode_png(image)?;

        let mut lt = leptess::LepTess::new(None, &self.inner.languages).map_err(|e| {
            ProcessError::OcrUnavailable(format!("Failed to initialize Tesseract: {}", e))
        })?;

        lt.set_variable(
            leptess::Variable::TesseditPagesegMode,
            &layout.page_seg_mode().to_string(),
        )
        .map_err(|e| {
            ProcessError::OcrUnavailable(format!("Failed to set page segmentation mode: {}", e))
        })?;

        lt.set_image_from_mem(&png_data)
            .map_err(|e| ProcessError::InvalidImage(format!("Failed to set image for OCR: {}", e)))?;
        lt.set_source_resolution(self.inner.dpi as i32);

        let tsv = lt
            .get_tsv_text(0)
            .map_err(|e| ProcessError::OcrUnavailable(format!("OCR failed: {}", e)))?;

        let tokens = order_tokens(parse_tsv(&tsv));
        log::debug!("Recognized {} tokens", tokens.len());
        Ok(tokens)
    }
}

/// Parses Tesseract TSV output into word tokens.
///
/// Columns: level, page_num, block_num, par_num, line_num, word_num, left,
/// top, width, height, conf, text. The header row and malformed rows are skipped.
pub fn parse_tsv(tsv: &str) -> Vec<Token> {
    tsv.lines()
        .filter_map(|row| {
            let cols: Vec<&str> = row.splitn(12, '\t').collect();
            if cols.len() < 12 {
                return None;
            }
            let level: u32 = cols[0].trim().parse().ok()?;
            if level != WORD_LEVEL {
                return None;
            }
            let text = cols[11].trim();
            if text.is_empty() {
                return None;
            }

            let num = |i: usize| cols[i].trim().parse::<u32>().ok();
            Some(Token {
                text: text.to_string(),
                bbox: BoundingBox {
                    x: num(6)?,
                    y: num(7)?,
                    width: num(8)?,
                    height: num(9)?,
                },
                confidence: cols[10].trim().parse::<f32>().unwrap_or(0.0),
                order: 0,
                line: LineKey {
                    block: num(2)?,
                    paragraph: num(3)?,
                    line: num(4)?,
                },
            })
        })
        .collect()
}

/// Puts tokens in reading order: lines in the order the recognizer emitted
/// them, words within a line left to right. Reassigns `order` from zero.
pub fn order_tokens(tokens: Vec<Token>) -> Vec<Token> {
    let mut lines: Vec<(LineKey, Vec<Token>)> = Vec::new();
    for token in tokens {
        match lines.iter_mut().find(|(key, _)| *key == token.line) {
            Some((_, words)) => words.push(token),
            None => lines.push((token.line, vec![token])),
        }
    }

    lines
        .into_iter()
        .flat_map(|(_, mut words)| {
            words.sort_by_key(|t| t.bbox.x);
            words
        })
        .enumerate()
        .map(|(order, mut token)| {
            token.order = order;
            token
        })
        .collect()
}
