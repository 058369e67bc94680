use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldDiagnostic {
    Matched,
    NotFound,
    /// Matched, but the value overlaps OCR tokens below the confidence threshold.
    LowConfidence,
}

impl FieldDiagnostic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Matched => "MATCHED",
            Self::NotFound => "NOT_FOUND",
            Self::LowConfidence => "LOW_CONFIDENCE",
        }
    }
}

impl fmt::Display for FieldDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldDiagnostic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MATCHED" => Ok(Self::Matched),
            "NOT_FOUND" => Ok(Self::NotFound),
            "LOW_CONFIDENCE" => Ok(Self::LowConfidence),
            other => Err(format!("unknown diagnostic '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue {
    pub name: String,
    /// Empty when not found.
    pub value: String,
    pub diagnostic: FieldDiagnostic,
    pub required: bool,
}

impl FieldValue {
    pub fn is_missing_required(&self) -> bool {
        self.required && self.diagnostic == FieldDiagnostic::NotFound
    }
}

/// Field values for one document, in configured field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    pub fields: Vec<FieldValue>,
}

impl ExtractionResult {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).map(|f| f.value.as_str())
    }

    pub fn missing_required(&self) -> impl Iterator<Item = &FieldValue> {
        self.fields.iter().filter(|f| f.is_missing_required())
    }

    pub fn low_confidence(&self) -> impl Iterator<Item = &FieldValue> {
        self.fields
            .iter()
            .filter(|f| f.diagnostic == FieldDiagnostic::LowConfidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_round_trips_through_text() {
        for diagnostic in [
            FieldDiagnostic::Matched,
            FieldDiagnostic::NotFound,
            FieldDiagnostic::LowConfidence,
        ] {
            assert_eq!(diagnostic.to_string().parse::<FieldDiagnostic>(), Ok(diagnostic));
        }
        assert!("maybe".parse::<FieldDiagnostic>().is_err());
    }

    #[test]
    fn test_missing_required() {
        let result = ExtractionResult {
            fields: vec![
                FieldValue {
                    name: "case_id".to_string(),
                    value: String::new(),
                    diagnostic: FieldDiagnostic::NotFound,
                    required: true,
                },
                FieldValue {
                    name: "notes".to_string(),
                    value: String::new(),
                    diagnostic: FieldDiagnostic::NotFound,
                    required: false,
                },
            ],
        };

        let missing: Vec<&str> = result.missing_required().map(|f| f.name.as_str()).collect();
        assert_eq!(missing, vec!["case_id"]);
        assert_eq!(result.value("notes"), Some(""));
        assert!(result.get("unknown").is_none());
    }
}
