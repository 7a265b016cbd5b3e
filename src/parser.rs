//! Line tokenizer for the `KEY=VALUE` dialect.
//!
//! Parsing never fails as a whole. Each line is classified on its own; bad
//! lines are reported (strict mode) or silently dropped (lenient mode) and
//! the scan always runs to the end of the input.

use tracing::debug;

use crate::types::{ConfigRecord, QuoteStyle, ValidationIssue};

/// How malformed lines are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    /// Report each malformed line as a `line-<n>` issue.
    #[default]
    Strict,
    /// Drop malformed lines without reporting them.
    Lenient,
}

/// Classification of a single source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    Blank,
    /// Comment text with the leading `#` and surrounding whitespace removed.
    Comment(&'a str),
    Entry {
        key: &'a str,
        value: &'a str,
        quote: QuoteStyle,
    },
    Invalid(&'static str),
}

/// Records and per-line errors produced by [`parse`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    pub records: Vec<ConfigRecord>,
    pub errors: Vec<ValidationIssue>,
}

impl ParseOutcome {
    /// Comment attached to `key`, if the key was parsed with one.
    pub fn comment_for(&self, key: &str) -> Option<&str> {
        self.records
            .iter()
            .rev()
            .find(|r| r.key == key)
            .and_then(|r| r.comment.as_deref())
    }
}

/// Split text into `\n`-delimited lines and classify each one.
pub fn scan(text: &str) -> impl Iterator<Item = Line<'_>> {
    text.split('\n').map(classify)
}

/// Classify one line.
pub fn classify(line: &str) -> Line<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Line::Blank;
    }
    if let Some(comment) = trimmed.strip_prefix('#') {
        return Line::Comment(comment.trim());
    }
    let Some((key, value)) = trimmed.split_once('=') else {
        return Line::Invalid("missing '=' character");
    };
    let key = key.trim();
    if key.is_empty() {
        return Line::Invalid("empty key");
    }
    let (value, quote) = strip_quotes(value.trim());
    Line::Entry { key, value, quote }
}

/// Remove exactly one matching pair of `"` or `'` around a value.
pub fn strip_quotes(value: &str) -> (&str, QuoteStyle) {
    if value.len() >= 2 {
        for (mark, style) in [('"', QuoteStyle::Double), ('\'', QuoteStyle::Single)] {
            if let Some(inner) = value.strip_prefix(mark).and_then(|v| v.strip_suffix(mark)) {
                return (inner, style);
            }
        }
    }
    (value, QuoteStyle::None)
}

/// Tokenize env text into records.
///
/// Consecutive comment lines build a pending block that attaches to the next
/// entry. A blank or malformed line discards the pending block.
pub fn parse(text: &str, mode: ParseMode) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();
    let mut pending: Vec<&str> = Vec::new();

    for (index, line) in scan(text).enumerate() {
        let line_no = index + 1;
        match line {
            Line::Blank => pending.clear(),
            Line::Comment(text) => pending.push(text),
            Line::Entry { key, value, quote } => {
                let comment = (!pending.is_empty()).then(|| pending.join("\n"));
                pending.clear();
                outcome.records.push(ConfigRecord {
                    key: key.to_string(),
                    value: value.to_string(),
                    comment,
                    line: line_no,
                    quote,
                });
            }
            Line::Invalid(reason) => {
                pending.clear();
                debug!(line = line_no, reason, "skipping malformed env line");
                if mode == ParseMode::Strict {
                    outcome
                        .errors
                        .push(ValidationIssue::error(format!("line-{line_no}"), reason));
                }
            }
        }
    }

    outcome
}
