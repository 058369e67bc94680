//! Builders for creating test data programmatically.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use image::{DynamicImage, GrayImage, Luma};
use lopdf::{dictionary, Object, Stream};

use fieldex::config::LayoutMode;
use fieldex::error::ProcessError;
use fieldex::processor::{BoundingBox, LineKey, OcrEngine, PageRasterizer, RasterSource, Token};

/// Builder for `mapping.yml` contents.
pub struct MappingBuilder {
    fields: Vec<String>,
    dedupe_key: Vec<String>,
    column_map: Vec<(String, String)>,
    extra: Vec<String>,
}

impl MappingBuilder {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            dedupe_key: Vec::new(),
            column_map: Vec::new(),
            extra: Vec::new(),
        }
    }

    pub fn keyword_line(mut self, name: &str, keyword: &str, required: bool) -> Self {
        self.fields.push(format!(
            "  - name: {}\n    required: {}\n    find: {{ type: keyword_line, keywords: [\"{}\"] }}\n",
            name, required, keyword
        ));
        self
    }

    pub fn keyword_right(mut self, name: &str, keyword: &str) -> Self {
        self.fields.push(format!(
            "  - name: {}\n    find: {{ type: keyword_right, keywords: [\"{}\"] }}\n",
            name, keyword
        ));
        self
    }

    pub fn regex(mut self, name: &str, pattern: &str) -> Self {
        self.fields.push(format!(
            "  - name: {}\n    find: {{ type: regex, pattern: '{}' }}\n",
            name, pattern
        ));
        self
    }

    pub fn dedupe_key(mut self, fields: &[&str]) -> Self {
        self.dedupe_key = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn map_column(mut self, source: &str, destination: &str) -> Self {
        self.column_map
            .push((source.to_string(), destination.to_string()));
        self
    }

    /// Raw YAML appended at the top level, e.g. `"worker_count: 2"`.
    pub fn raw(mut self, yaml: &str) -> Self {
        self.extra.push(yaml.to_string());
        self
    }

    pub fn build(self) -> String {
        let mut yaml = String::from("fields:\n");
        for field in &self.fields {
            yaml.push_str(field);
        }
        if !self.dedupe_key.is_empty() {
            yaml.push_str(&format!("dedupe_key: [{}]\n", self.dedupe_key.join(", ")));
        }
        for extra in &self.extra {
            yaml.push_str(extra);
            yaml.push('\n');
        }
        yaml.push_str("output:\n  review_csv: review.csv\n  access_ready_csv: access_ready.csv\n");
        yaml.push_str("access:\n  column_map:\n");
        for (source, destination) in &self.column_map {
            yaml.push_str(&format!("    {}: {}\n", source, destination));
        }
        yaml
    }
}

impl Default for MappingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The mapping most tests use: a required case id (the dedupe key) and a
/// patient name, both handed off.
pub fn case_mapping() -> String {
    MappingBuilder::new()
        .keyword_line("case_id", "Case ID", true)
        .keyword_right("patient", "Patient:")
        .dedupe_key(&["case_id"])
        .map_column("case_id", "CaseID")
        .map_column("patient", "PatientName")
        .raw("worker_count: 2")
        .build()
}

/// A PDF with one page per entry; `None` gives a page with no text layer.
pub fn pdf_bytes(pages: &[Option<&str>]) -> Vec<u8> {
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

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Recognizer stand-in: every page reads as the same words on one line.
pub struct FakeOcr {
    words: Vec<(String, f32)>,
    calls: AtomicUsize,
}

impl FakeOcr {
    pub fn new(words: &[(&str, f32)]) -> Self {
        Self {
            words: words.iter().map(|(w, c)| (w.to_string(), *c)).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for FakeOcr {
    fn recognize(&self, _image: &GrayImage, _layout: LayoutMode) -> Result<Vec<Token>, ProcessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .words
            .iter()
            .enumerate()
            .map(|(i, (text, confidence))| Token {
                text: text.clone(),
                bbox: BoundingBox {
                    x: 10 + i as u32 * 50,
                    y: 10,
                    width: 40,
                    height: 12,
                },
                confidence: *confidence,
                order: i,
                line: LineKey::default(),
            })
            .collect())
    }
}

/// Renders every page as a small blank image.
pub struct WhiteRasterizer;

impl PageRasterizer for WhiteRasterizer {
    fn rasterize(&self, _source: &RasterSource, _dpi: u32) -> Result<DynamicImage, ProcessError> {
        Ok(DynamicImage::ImageLuma8(GrayImage::from_pixel(32, 32, Luma([255]))))
    }
}
