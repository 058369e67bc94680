//! Column names of the review artifact.

pub const SOURCE_PDF: &str = "_source_pdf";
pub const EXTRACTION_OK: &str = "_extraction_ok";
pub const DEDUPE_KEY: &str = "_dedupe_key";
pub const DEDUPE_FLAG: &str = "_dedupe_flag";
pub const REVIEW_STATUS: &str = "_review_status";
pub const REVIEW_COMMENT: &str = "_review_comment";
pub const NOTES: &str = "_notes";

/// Suffix of the per-field diagnostic column.
pub const DIAGNOSTIC_SUFFIX: &str = "__diag";

/// Bookkeeping columns, in the order they lead every row.
pub const RESERVED: [&str; 7] = [
    SOURCE_PDF,
    EXTRACTION_OK,
    DEDUPE_KEY,
    DEDUPE_FLAG,
    REVIEW_STATUS,
    REVIEW_COMMENT,
    NOTES,
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name) || name.ends_with(DIAGNOSTIC_SUFFIX)
}

pub fn diagnostic_column(field: &str) -> String {
    format!("{}{}", field, DIAGNOSTIC_SUFFIX)
}

/// The full header for a given field list.
pub fn header(field_names: &[String]) -> Vec<String> {
    RESERVED
        .iter()
        .map(|c| c.to_string())
        .chain(field_names.iter().cloned())
        .chain(field_names.iter().map(|f| diagnostic_column(f)))
        .collect()
}
