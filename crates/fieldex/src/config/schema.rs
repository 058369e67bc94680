use std::fmt;
use std::path::PathBuf;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub dedupe_key: Vec<String>,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub preprocess: PreprocessConfig,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Run-level deadline; pages still waiting for OCR when it passes resolve empty.
    #[serde(default)]
    pub page_timeout_secs: Option<u64>,
    pub output: OutputConfig,
    pub access: AccessConfig,
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub find: FindStrategy,
    #[serde(default)]
    pub required: bool,
}

/// How a field value is located in the working text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FindStrategy {
    KeywordLine {
        keywords: Vec<String>,
        #[serde(default = "default_true")]
        ignore_case: bool,
    },
    KeywordRight {
        keywords: Vec<String>,
        #[serde(default = "default_true")]
        ignore_case: bool,
        #[serde(default)]
        stop_pattern: Option<String>,
    },
    Regex {
        pattern: String,
        #[serde(default = "default_true")]
        ignore_case: bool,
    },
}

impl FindStrategy {
    pub const KINDS: [&'static str; 3] = ["keyword_line", "keyword_right", "regex"];

    pub fn kind(&self) -> &'static str {
        match self {
            Self::KeywordLine { .. } => "keyword_line",
            Self::KeywordRight { .. } => "keyword_right",
            Self::Regex { .. } => "regex",
        }
    }
}

/// Page segmentation hint handed to the recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    #[default]
    UniformBlock,
    SingleColumn,
    SparseText,
}

impl LayoutMode {
    /// Tesseract page segmentation mode number.
    pub fn page_seg_mode(&self) -> u8 {
        match self {
            Self::UniformBlock => 6,
            Self::SingleColumn => 4,
            Self::SparseText => 11,
        }
    }
}

impl std::str::FromStr for LayoutMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uniform_block" | "block" => Ok(Self::UniformBlock),
            "single_column" | "column" => Ok(Self::SingleColumn),
            "sparse_text" | "sparse" => Ok(Self::SparseText),
            other => Err(format!("unknown layout mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    #[serde(default)]
    pub layout: LayoutMode,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    #[serde(default = "default_min_embedded_chars")]
    pub min_embedded_chars: usize,
}

fn default_languages() -> Vec<String> {
    vec!["eng".to_string()]
}

fn default_dpi() -> u32 {
    300
}

fn default_min_confidence() -> f32 {
    60.0
}

fn default_min_embedded_chars() -> usize {
    5
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            languages: default_languages(),
            dpi: default_dpi(),
            layout: LayoutMode::default(),
            min_confidence: default_min_confidence(),
            min_embedded_chars: default_min_embedded_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    #[serde(default = "default_denoise_radius")]
    pub denoise_radius: u32,
    #[serde(default = "default_threshold_block_radius")]
    pub threshold_block_radius: u32,
    #[serde(default = "default_threshold_offset")]
    pub threshold_offset: i32,
}

fn default_denoise_radius() -> u32 {
    1
}

fn default_threshold_block_radius() -> u32 {
    15
}

fn default_threshold_offset() -> i32 {
    10
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            denoise_radius: default_denoise_radius(),
            threshold_block_radius: default_threshold_block_radius(),
            threshold_offset: default_threshold_offset(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub review_csv: String,
    pub access_ready_csv: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    pub column_map: ColumnMap,
    #[serde(default)]
    pub bulk_import: Option<BulkImportConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkImportConfig {
    pub command: PathBuf,
    pub database: PathBuf,
    #[serde(default)]
    pub r#macro: Option<String>,
    #[serde(default = "default_import_timeout")]
    pub timeout_sec: u64,
    #[serde(default = "default_true")]
    pub use_cmd_argument: bool,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default)]
    pub workdir: Option<PathBuf>,
}

fn default_import_timeout() -> u64 {
    600
}

/// Review column → destination column, in the order written in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnMap(Vec<(String, String)>);

impl ColumnMap {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self(entries)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(s, d)| (s.as_str(), d.as_str()))
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(s, _)| s.as_str())
    }

    pub fn destinations(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(_, d)| d.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<'de> Deserialize<'de> for ColumnMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = ColumnMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of review columns to destination columns")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((source, destination)) = map.next_entry::<String, String>()? {
                    entries.push((source, destination));
                }
                Ok(ColumnMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Pdf,
    Image,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "png" | "jpg" | "jpeg" | "tiff" | "tif" | "bmp" | "gif" | "webp" => Some(Self::Image),
            _ => None,
        }
    }
}
