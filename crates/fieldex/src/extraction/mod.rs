pub mod engine;
pub mod result;
pub mod strategy;

pub use engine::FieldExtractor;
pub use result::{ExtractionResult, FieldDiagnostic, FieldValue};
pub use strategy::{Found, Strategy};
