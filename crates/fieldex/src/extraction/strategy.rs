use std::ops::Range;

use regex::{Regex, RegexBuilder};

use crate::config::schema::FindStrategy;
use crate::error::ConfigError;

/// A located value and the byte range it was taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    pub value: String,
    pub span: Range<usize>,
}

/// A field strategy with its patterns compiled once per run.
#[derive(Debug, Clone)]
pub enum Strategy {
    KeywordLine { keywords: Regex },
    KeywordRight { keywords: Regex, stop: Option<Regex> },
    Regex { pattern: Regex },
}

impl Strategy {
    pub fn compile(field: &str, find: &FindStrategy) -> Result<Self, ConfigError> {
        match find {
            FindStrategy::KeywordLine {
                keywords,
                ignore_case,
            } => Ok(Self::KeywordLine {
                keywords: keyword_pattern(field, keywords, *ignore_case)?,
            }),
            FindStrategy::KeywordRight {
                keywords,
                ignore_case,
                stop_pattern,
            } => Ok(Self::KeywordRight {
                keywords: keyword_pattern(field, keywords, *ignore_case)?,
                stop: stop_pattern
                    .as_deref()
                    .map(|p| build(field, p, *ignore_case))
                    .transpose()?,
            }),
            FindStrategy::Regex {
                pattern,
                ignore_case,
            } => Ok(Self::Regex {
                pattern: build(field, pattern, *ignore_case)?,
            }),
        }
    }

    /// First qualifying value in reading order.
    pub fn find(&self, text: &str) -> Option<Found> {
        match self {
            Self::KeywordLine { keywords } => find_keyword_line(keywords, text),
            Self::KeywordRight { keywords, stop } => find_keyword_right(keywords, stop.as_ref(), text),
            Self::Regex { pattern } => find_regex(pattern, text),
        }
    }
}

/// Keywords are literal text; alternation keeps config order for matches
/// starting at the same offset.
fn keyword_pattern(field: &str, keywords: &[String], ignore_case: bool) -> Result<Regex, ConfigError> {
    let alternatives: Vec<String> = keywords.iter().map(|k| regex::escape(k.trim())).collect();
    build(field, &alternatives.join("|"), ignore_case)
}

fn build(field: &str, pattern: &str, ignore_case: bool) -> Result<Regex, ConfigError> {
    RegexBuilder::new(pattern)
        .case_insensitive(ignore_case)
        .build()
        .map_err(|e| ConfigError::InvalidPattern {
            field: field.to_string(),
            reason: e.to_string(),
        })
}

fn is_separator(c: char) -> bool {
    c == ':' || c == '-' || c.is_whitespace()
}

/// Trims `text[range]` of leading separators and trailing whitespace.
/// Returns `None` when nothing is left.
fn trimmed_value(text: &str, range: Range<usize>) -> Option<Found> {
    let slice = &text[range.clone()];
    let after_lead = slice.trim_start_matches(is_separator);
    let value = after_lead.trim_end();
    if value.is_empty() {
        return None;
    }
    let start = range.start + (slice.len() - after_lead.len());
    Some(Found {
        value: value.to_string(),
        span: start..start + value.len(),
    })
}

fn find_keyword_line(keywords: &Regex, text: &str) -> Option<Found> {
    let mut line_start = 0;
    for line in text.split('\n') {
        if let Some(m) = keywords.find(line) {
            let tail = line_start + m.end()..line_start + line.len();
            if let Some(found) = trimmed_value(text, tail) {
                return Some(found);
            }
        }
        line_start += line.len() + 1;
    }
    None
}

fn find_keyword_right(keywords: &Regex, stop: Option<&Regex>, text: &str) -> Option<Found> {
    for m in keywords.find_iter(text) {
        let rest = &text[m.end()..];
        let rest = rest.trim_start_matches(|c: char| c == ':' || c == '-' || c == ' ' || c == '\t');
        let start = text.len() - rest.len();

        let mut end = rest.find('\n').unwrap_or(rest.len());
        if let Some(stop) = stop {
            if let Some(stop_match) = stop.find(&rest[..end]) {
                end = stop_match.start();
            }
        }

        if let Some(found) = trimmed_value(text, start..start + end) {
            return Some(found);
        }
    }
    None
}

fn find_regex(pattern: &Regex, text: &str) -> Option<Found> {
    let captures = pattern.captures(text)?;
    let group = if pattern.captures_len() > 1 {
        captures.get(1)?
    } else {
        captures.get(0)?
    };

    let value = group.as_str().trim();
    if value.is_empty() {
        return None;
    }
    let start = group.start() + (group.as_str().len() - group.as_str().trim_start().len());
    Some(Found {
        value: value.to_string(),
        span: start..start + value.len(),
    })
}
