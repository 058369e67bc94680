pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_root, load_config_from_str};
pub use schema::{
    AccessConfig, BulkImportConfig, ColumnMap, DocumentFormat, FieldDefinition, FindStrategy,
    LayoutMode, MappingConfig, OcrConfig, OutputConfig, PreprocessConfig,
};
