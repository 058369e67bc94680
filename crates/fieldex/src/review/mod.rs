pub mod artifact;
pub mod columns;
pub mod csv;
pub mod record;

pub use artifact::{ReviewArtifact, ReviewLayout, ReviewedRow};
pub use self::csv::CsvReviewArtifact;
pub use record::{ReviewRecord, ReviewRecordBuilder, ReviewStatus};
