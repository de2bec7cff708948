//! Source-field accessor.
//!
//! `key_name` is either a plain top-level key (`client_ip`) or a record
//! accessor path reaching into nested objects: `$.request.ip` or
//! `$['request']['ip']`. The two path notations can be mixed.

use serde_json::Value;

use super::Record;
use crate::error_handling::ConfigurationError;

const OPTION: &str = "key_name";

/// A parsed `key_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPath {
    /// Top-level key, taken literally
    Key(String),
    /// Nested path, outermost key first
    Nested(Vec<String>),
}

impl FieldPath {
    /// Parses `key_name`.
    ///
    /// # Errors
    ///
    /// `InvalidOption` for an empty key or a malformed `$` path.
    pub fn parse(text: &str) -> Result<Self, ConfigurationError> {
        if text.is_empty() {
            return Err(ConfigurationError::invalid(OPTION, "must not be empty"));
        }
        match text.strip_prefix('$') {
            Some(rest) => parse_path(rest).map(FieldPath::Nested),
            None => Ok(FieldPath::Key(text.to_string())),
        }
    }

    /// Resolves the path against `record`.
    pub fn get<'a>(&self, record: &'a Record) -> Option<&'a Value> {
        match self {
            FieldPath::Key(key) => record.get(key),
            FieldPath::Nested(segments) => {
                let (first, rest) = segments.split_first()?;
                rest.iter()
                    .try_fold(record.get(first)?, |value, segment| value.get(segment))
            }
        }
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldPath::Key(key) => f.write_str(key),
            FieldPath::Nested(segments) => {
                f.write_str("$")?;
                segments.iter().try_for_each(|s| write!(f, "['{}']", s))
            }
        }
    }
}

fn malformed(rest: &str, reason: &str) -> ConfigurationError {
    ConfigurationError::invalid(OPTION, format!("malformed accessor '${}': {}", rest, reason))
}

fn parse_path(rest: &str) -> Result<Vec<String>, ConfigurationError> {
    let mut segments = Vec::new();
    let mut remaining = rest;

    while !remaining.is_empty() {
        if let Some(after_dot) = remaining.strip_prefix('.') {
            let end = after_dot.find(['.', '[']).unwrap_or(after_dot.len());
            let name = &after_dot[..end];
            if name.is_empty() {
                return Err(malformed(rest, "empty segment"));
            }
            segments.push(name.to_string());
            remaining = &after_dot[end..];
        } else if let Some(after_bracket) = remaining.strip_prefix('[') {
            let quote = match after_bracket.chars().next() {
                Some(q @ ('\'' | '"')) => q,
                _ => return Err(malformed(rest, "expected a quoted key after '['")),
            };
            let body = &after_bracket[1..];
            let close = body
                .find(quote)
                .ok_or_else(|| malformed(rest, "unterminated quoted key"))?;
            let name = &body[..close];
            if name.is_empty() {
                return Err(malformed(rest, "empty segment"));
            }
            remaining = body[close + 1..]
                .strip_prefix(']')
                .ok_or_else(|| malformed(rest, "expected ']'"))?;
            segments.push(name.to_string());
        } else {
            return Err(malformed(rest, "expected '.' or '['"));
        }
    }

    if segments.is_empty() {
        return Err(malformed(rest, "no keys"));
    }
    Ok(segments)
}
