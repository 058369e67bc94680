use std::collections::{HashMap, HashSet};

use crate::extraction::ExtractionResult;

/// Where an earlier record with the same composite key was seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateSource {
    /// An earlier document in the same batch.
    Batch { document: String },
    /// A key recorded by a previous, already archived upload.
    Archived,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupeFlag {
    /// Composite key; `None` when any key field is empty.
    pub key: Option<String>,
    pub duplicate_of: Option<DuplicateSource>,
}

impl DedupeFlag {
    pub fn is_duplicate(&self) -> bool {
        self.duplicate_of.is_some()
    }
}

/// Flags documents whose configured key fields match an earlier document
/// in the batch or an archived key.
#[derive(Debug, Clone)]
pub struct DedupDetector {
    key_fields: Vec<String>,
}

impl DedupDetector {
    pub fn new(key_fields: Vec<String>) -> Self {
        Self { key_fields }
    }

    pub fn is_enabled(&self) -> bool {
        !self.key_fields.is_empty()
    }

    /// Trimmed, lowercased values joined with `|`. Missing data never forms a key.
    pub fn composite_key(&self, result: &ExtractionResult) -> Option<String> {
        self.key_from(|name| result.value(name))
    }

    /// Same key as [`composite_key`](Self::composite_key), built from any
    /// field lookup, e.g. the corrected cells of a reviewed row.
    pub fn key_from<'a, F>(&self, value: F) -> Option<String>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        if !self.is_enabled() {
            return None;
        }

        let parts = self
            .key_fields
            .iter()
            .map(|name| {
                let value = value(name)?.trim();
                (!value.is_empty()).then(|| value.to_lowercase())
            })
            .collect::<Option<Vec<String>>>()?;

        Some(parts.join("|"))
    }

    /// Flags a whole batch. `results` must be in batch order; the first
    /// occurrence of a key is kept unflagged.
    pub fn flag_batch(
        &self,
        results: &[(String, &ExtractionResult)],
        archived: &HashSet<String>,
    ) -> Vec<DedupeFlag> {
        let _span = tracing::info_span!("dedupe", documents = results.len()).entered();

        let mut first_seen: HashMap<String, &str> = HashMap::new();
        let flags: Vec<DedupeFlag> = results
            .iter()
            .map(|(document, result)| {
                let Some(key) = self.composite_key(result) else {
                    return DedupeFlag::default();
                };

                let duplicate_of = if archived.contains(&key) {
                    Some(DuplicateSource::Archived)
                } else if let Some(first) = first_seen.get(&key) {
                    Some(DuplicateSource::Batch {
                        document: first.to_string(),
                    })
                } else {
                    first_seen.insert(key.clone(), document.as_str());
                    None
                };

                DedupeFlag {
                    key: Some(key),
                    duplicate_of,
                }
            })
            .collect();

        let duplicates = flags.iter().filter(|f| f.is_duplicate()).count();
        if duplicates > 0 {
            log::info!("Flagged {} possible duplicate(s)", duplicates);
        }

        flags
    }
}
