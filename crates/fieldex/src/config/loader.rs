use std::collections::HashSet;
use std::path::Path;

use crate::config::schema::{FindStrategy, MappingConfig};
use crate::error::ConfigError;
use crate::review::columns;

const SCHEMA_JSON: &str = include_str!("../../../../schema/mapping-v1.json");

pub const CONFIG_DIR: &str = "config";
pub const CONFIG_FILENAME: &str = "mapping.yml";

/// Loads `<root>/config/mapping.yml`.
pub fn load_config_from_root<P: AsRef<Path>>(root: P) -> Result<MappingConfig, ConfigError> {
    load_config(root.as_ref().join(CONFIG_DIR).join(CONFIG_FILENAME))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<MappingConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<MappingConfig, ConfigError> {
    let yaml_value: serde_yaml::Value = serde_yaml::from_str(content)?;
    if !yaml_value.is_mapping() {
        return Err(ConfigError::Validation {
            message: "mapping.yml must define a mapping at the root level".to_string(),
        });
    }

    let json_value = serde_json::to_value(&yaml_value).map_err(|e| ConfigError::Validation {
        message: format!("Config cannot be represented as JSON: {}", e),
    })?;

    check_strategy_kinds(&json_value)?;
    validate_schema(&json_value)?;

    let config: MappingConfig = serde_yaml::from_value(yaml_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// Reports unknown `find.type` values by field name before the schema or serde
/// get a chance to produce a less specific message.
fn check_strategy_kinds(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let Some(fields) = json_value.get("fields").and_then(|f| f.as_array()) else {
        return Ok(());
    };

    for (index, field) in fields.iter().enumerate() {
        let kind = field
            .get("find")
            .and_then(|f| f.get("type"))
            .and_then(|t| t.as_str());
        if let Some(kind) = kind {
            if !FindStrategy::KINDS.contains(&kind) {
                let name = field
                    .get("name")
                    .and_then(|n| n.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("fields[{}]", index));
                return Err(ConfigError::UnknownStrategy {
                    field: name,
                    kind: kind.to_string(),
                });
            }
        }
    }

    Ok(())
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &MappingConfig) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for field in &config.fields {
        if field.name.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "Field names must not be blank".to_string(),
            });
        }
        if columns::is_reserved(&field.name) {
            return Err(ConfigError::Validation {
                message: format!("Field name '{}' collides with a reserved column", field.name),
            });
        }
        if !names.insert(field.name.as_str()) {
            return Err(ConfigError::DuplicateField {
                name: field.name.clone(),
            });
        }

        validate_strategy(&field.name, &field.find)?;
    }

    for key in &config.dedupe_key {
        if !names.contains(key.as_str()) {
            return Err(ConfigError::UnknownField {
                context: "dedupe_key".to_string(),
                name: key.clone(),
            });
        }
    }

    for source in config.access.column_map.sources() {
        if !names.contains(source) && !columns::is_reserved(source) {
            return Err(ConfigError::UnknownField {
                context: "access.column_map".to_string(),
                name: source.to_string(),
            });
        }
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    if !(0.0..=100.0).contains(&config.ocr.min_confidence) {
        return Err(ConfigError::Validation {
            message: format!(
                "ocr.min_confidence must be between 0 and 100, got {}",
                config.ocr.min_confidence
            ),
        });
    }

    Ok(())
}

fn validate_strategy(field: &str, strategy: &FindStrategy) -> Result<(), ConfigError> {
    match strategy {
        FindStrategy::KeywordLine { keywords, .. } => validate_keywords(field, keywords),
        FindStrategy::KeywordRight {
            keywords,
            stop_pattern,
            ..
        } => {
            validate_keywords(field, keywords)?;
            if let Some(pattern) = stop_pattern {
                compile_check(field, pattern)?;
            }
            Ok(())
        }
        FindStrategy::Regex { pattern, .. } => {
            if pattern.is_empty() {
                return Err(ConfigError::InvalidPattern {
                    field: field.to_string(),
                    reason: "pattern must not be empty".to_string(),
                });
            }
            compile_check(field, pattern)
        }
    }
}

fn validate_keywords(field: &str, keywords: &[String]) -> Result<(), ConfigError> {
    if keywords.is_empty() || keywords.iter().any(|k| k.trim().is_empty()) {
        return Err(ConfigError::Validation {
            message: format!("Field '{}' needs at least one non-blank keyword", field),
        });
    }
    Ok(())
}

fn compile_check(field: &str, pattern: &str) -> Result<(), ConfigError> {
    regex::Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidPattern {
            field: field.to_string(),
            reason: e.to_string(),
        })
}
