//! Value coercion and quoting.
//!
//! Reading: booleans are canonicalised, numbers are checked, URLs are
//! re-serialised through a strict parser. Writing: values that the tokenizer
//! would mangle are wrapped in double quotes with `\` and `"` escaped.

use url::Url;

use crate::heuristics::{KeyHeuristics, KeyKind};
use crate::types::QuoteStyle;

const TRUTHY: &[&str] = &["true", "1", "yes", "on"];
const FALSY: &[&str] = &["false", "0", "no", "off"];

/// A coerced value plus any observations made while coercing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub value: String,
    pub warnings: Vec<String>,
}

/// Applies key-name heuristics to raw values.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    heuristics: KeyHeuristics,
}

impl Normalizer {
    pub fn new(heuristics: KeyHeuristics) -> Self {
        Self { heuristics }
    }

    pub fn heuristics(&self) -> &KeyHeuristics {
        &self.heuristics
    }

    /// Coerce `value` according to what `key`'s name suggests.
    ///
    /// Never fails. Values that do not fit the inferred type are passed
    /// through unchanged, with a warning for numeric keys.
    pub fn normalize(&self, key: &str, value: &str) -> Normalized {
        let mut warnings = Vec::new();
        let value = match self.heuristics.kind_of(key) {
            KeyKind::Boolean => coerce_bool(value).unwrap_or(value).to_string(),
            KeyKind::Numeric => {
                if !value.is_empty() && !is_numeric(value) {
                    warnings.push(format!("{key} has invalid numeric value: {value}"));
                }
                value.to_string()
            }
            KeyKind::Url => match normalize_url(value) {
                Some(normalized) if normalized != value => {
                    warnings.push(format!(
                        "{key}: URL was normalized from '{value}' to '{normalized}'"
                    ));
                    normalized
                }
                _ => value.to_string(),
            },
            KeyKind::Plain => value.to_string(),
        };
        Normalized { value, warnings }
    }

    /// Undo quoting-time escapes, then normalize.
    pub fn normalize_record(&self, key: &str, value: &str, quote: QuoteStyle) -> Normalized {
        match quote {
            QuoteStyle::Double => self.normalize(key, &unescape(value)),
            QuoteStyle::Single | QuoteStyle::None => self.normalize(key, value),
        }
    }
}

/// Map a truthy/falsy spelling to `"true"`/`"false"`.
pub fn coerce_bool(value: &str) -> Option<&'static str> {
    let lower = value.trim().to_ascii_lowercase();
    if TRUTHY.contains(&lower.as_str()) {
        Some("true")
    } else if FALSY.contains(&lower.as_str()) {
        Some("false")
    } else {
        None
    }
}

/// Integer or finite decimal. `NaN` and `inf` are not numbers here.
pub fn is_numeric(value: &str) -> bool {
    let value = value.trim();
    if value.parse::<i64>().is_ok() {
        return true;
    }
    value.parse::<f64>().is_ok_and(f64::is_finite)
        && value.chars().all(|c| c.is_ascii_digit() || "+-.eE".contains(c))
}

/// Re-serialise through the URL parser. `None` when the value does not parse.
pub fn normalize_url(value: &str) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    Url::parse(value).ok().map(String::from)
}

/// Whether a value must be quoted to survive a parse.
pub fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '\\' | '`' | '$'))
}

/// Escape `\` and `"` for use inside double quotes.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(ch),
        }
    }
    out
}

/// Inverse of [`escape`]. Unknown escape sequences are kept verbatim.
pub fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Render a value for the right-hand side of `KEY=`.
pub fn quote(value: &str) -> String {
    if needs_quoting(value) {
        format!("\"{}\"", escape(value))
    } else {
        value.to_string()
    }
}
