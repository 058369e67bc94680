use crate::config::schema::FieldDefinition;
use crate::error::ConfigError;
use crate::extraction::result::{ExtractionResult, FieldDiagnostic, FieldValue};
use crate::extraction::strategy::Strategy;
use crate::processor::WorkingText;

struct CompiledField {
    name: String,
    required: bool,
    strategy: Strategy,
}

/// Applies every configured field strategy to a document's working text.
pub struct FieldExtractor {
    fields: Vec<CompiledField>,
}

impl FieldExtractor {
    pub fn new(definitions: &[FieldDefinition]) -> Result<Self, ConfigError> {
        let fields = definitions
            .iter()
            .map(|definition| {
                Ok(CompiledField {
                    name: definition.name.clone(),
                    required: definition.required,
                    strategy: Strategy::compile(&definition.name, &definition.find)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self { fields })
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn extract(&self, text: &WorkingText) -> ExtractionResult {
        let _span = tracing::info_span!("extract_fields", fields = self.fields.len()).entered();

        let fields = self
            .fields
            .iter()
            .map(|field| match field.strategy.find(text.as_str()) {
                Some(found) => FieldValue {
                    name: field.name.clone(),
                    diagnostic: if text.overlaps_low_confidence(&found.span) {
                        FieldDiagnostic::LowConfidence
                    } else {
                        FieldDiagnostic::Matched
                    },
                    value: found.value,
                    required: field.required,
                },
                None => {
                    if field.required {
                        log::debug!("Required field '{}' not found", field.name);
                    }
                    FieldValue {
                        name: field.name.clone(),
                        value: String::new(),
                        diagnostic: FieldDiagnostic::NotFound,
                        required: field.required,
                    }
                }
            })
            .collect();

        ExtractionResult { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::FindStrategy;
    use crate::processor::ocr::{BoundingBox, LineKey, Token};
    use crate::processor::resolver::{PageOutcome, ResolvedPage};

    fn field(name: &str, find: FindStrategy, required: bool) -> FieldDefinition {
        FieldDefinition {
            name: name.to_string(),
            find,
            required,
        }
    }

    fn line(keywords: &[&str]) -> FindStrategy {
        FindStrategy::KeywordLine {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            ignore_case: true,
        }
    }

    fn definitions() -> Vec<FieldDefinition> {
        vec![
            field("case_id", line(&["Case ID"]), true),
            field(
                "patient",
                FindStrategy::KeywordRight {
                    keywords: vec!["Patient".to_string()],
                    ignore_case: true,
                    stop_pattern: None,
                },
                false,
            ),
            field(
                "dob",
                FindStrategy::Regex {
                    pattern: r"DOB:\s*(\d{4}-\d{2}-\d{2})".to_string(),
                    ignore_case: true,
                },
                true,
            ),
        ]
    }

    #[test]
    fn test_extracts_case_id() {
        let extractor = FieldExtractor::new(&definitions()).unwrap();
        let result = extractor.extract(&WorkingText::from_text("Case ID: 4521\nPatient: Jane Doe"));

        let case_id = result.get("case_id").unwrap();
        assert_eq!(case_id.value, "4521");
        assert_eq!(case_id.diagnostic, FieldDiagnostic::Matched);
        assert_eq!(result.value("patient"), Some("Jane Doe"));
    }

    #[test]
    fn test_missing_required_field_is_not_found() {
        let extractor = FieldExtractor::new(&definitions()).unwrap();
        let result = extractor.extract(&WorkingText::from_text("Case ID: 4521\nPatient: Jane Doe"));

        let dob = result.get("dob").unwrap();
        assert_eq!(dob.diagnostic, FieldDiagnostic::NotFound);
        assert!(dob.value.is_empty());
        assert_eq!(result.missing_required().count(), 1);
    }

    #[test]
    fn test_results_follow_configured_order() {
        let extractor = FieldExtractor::new(&definitions()).unwrap();
        let names: Vec<&str> = extractor.field_names().collect();
        assert_eq!(names, vec!["case_id", "patient", "dob"]);

        let result = extractor.extract(&WorkingText::from_text(""));
        let names: Vec<&str> = result.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["case_id", "patient", "dob"]);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let extractor = FieldExtractor::new(&definitions()).unwrap();
        let text = WorkingText::from_text("Patient: A B\nCase ID: 9\nDOB: 1980-02-03");

        assert_eq!(extractor.extract(&text), extractor.extract(&text));
    }

    #[test]
    fn test_first_page_wins() {
        let extractor = FieldExtractor::new(&definitions()).unwrap();
        let pages: Vec<ResolvedPage> = ["Case ID: 1", "Case ID: 2"]
            .iter()
            .enumerate()
            .map(|(index, text)| ResolvedPage {
                index,
                outcome: PageOutcome::Embedded,
                text: text.to_string(),
                tokens: Vec::new(),
            })
            .collect();

        let result = extractor.extract(&WorkingText::assemble(&pages, 60.0));
        assert_eq!(result.value("case_id"), Some("1"));
    }

    #[test]
    fn test_low_confidence_value_is_flagged() {
        let token = |text: &str, x: u32, confidence: f32, order: usize| Token {
            text: text.to_string(),
            bbox: BoundingBox {
                x,
                y: 0,
                width: 30,
                height: 10,
            },
            confidence,
            order,
            line: LineKey::default(),
        };
        let page = ResolvedPage {
            index: 0,
            outcome: PageOutcome::Ocr,
            text: String::new(),
            tokens: vec![
                token("Case", 0, 96.0, 0),
                token("ID:", 40, 94.0, 1),
                token("4S21", 80, 35.0, 2),
            ],
        };

        let extractor = FieldExtractor::new(&definitions()).unwrap();
        let result = extractor.extract(&WorkingText::assemble(&[page], 60.0));

        let case_id = result.get("case_id").unwrap();
        assert_eq!(case_id.value, "4S21");
        assert_eq!(case_id.diagnostic, FieldDiagnostic::LowConfidence);
        assert_eq!(result.low_confidence().count(), 1);
    }

    #[test]
    fn test_invalid_pattern_fails_construction() {
        let defs = vec![field(
            "broken",
            FindStrategy::Regex {
                pattern: "[".to_string(),
                ignore_case: true,
            },
            false,
        )];
        assert!(matches!(
            FieldExtractor::new(&defs),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }
}
