use std::ops::Range;

use crate::processor::ocr::Token;
use crate::processor::resolver::ResolvedPage;

/// The page-concatenated text fields are extracted from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingText {
    text: String,
    /// Byte ranges of tokens the recognizer was not confident about.
    low_confidence_spans: Vec<Range<usize>>,
    /// Byte offset where each page starts.
    page_offsets: Vec<usize>,
}

impl WorkingText {
    /// Joins resolved pages with line breaks. OCR pages are rebuilt from their
    /// tokens so low-confidence spans line up with the final text.
    pub fn assemble(pages: &[ResolvedPage], min_confidence: f32) -> Self {
        let mut working = WorkingText::default();

        for (i, page) in pages.iter().enumerate() {
            if i > 0 {
                working.text.push('\n');
            }
            let start = working.text.len();
            working.page_offsets.push(start);

            if page.tokens.is_empty() {
                working.text.push_str(&page.text);
            } else {
                let (page_text, spans) = join_tokens(&page.tokens, min_confidence);
                working.text.push_str(&page_text);
                working
                    .low_confidence_spans
                    .extend(spans.into_iter().map(|r| r.start + start..r.end + start));
            }
        }

        working
    }

    /// Single-page working text with no confidence information.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            low_confidence_spans: Vec::new(),
            page_offsets: vec![0],
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn low_confidence_spans(&self) -> &[Range<usize>] {
        &self.low_confidence_spans
    }

    pub fn page_count(&self) -> usize {
        self.page_offsets.len()
    }

    /// Zero-based page containing the byte at `offset`.
    pub fn page_of(&self, offset: usize) -> usize {
        self.page_offsets
            .iter()
            .rposition(|&start| start <= offset)
            .unwrap_or(0)
    }

    pub fn overlaps_low_confidence(&self, span: &Range<usize>) -> bool {
        self.low_confidence_spans
            .iter()
            .any(|low| low.start < span.end && span.start < low.end)
    }
}

/// Words on one recognizer line are joined by spaces, lines by newlines.
/// Returns the text and the byte ranges of tokens below `min_confidence`.
pub fn join_tokens(tokens: &[Token], min_confidence: f32) -> (String, Vec<Range<usize>>) {
    let mut text = String::new();
    let mut spans = Vec::new();
    let mut previous_line = None;

    for token in tokens {
        match previous_line {
            None => {}
            Some(line) if line == token.line => text.push(' '),
            Some(_) => text.push('\n'),
        }
        previous_line = Some(token.line);

        let start = text.len();
        text.push_str(&token.text);
        if token.is_low_confidence(min_confidence) {
            spans.push(start..text.len());
        }
    }

    (text, spans)
}
