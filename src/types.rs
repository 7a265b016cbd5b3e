//! Plain data shapes shared by the parser, converter and validators.
//!
//! Everything here is framework-free: the surrounding application receives
//! these values as-is (they all serialize with serde) and decides how to
//! render or persist them.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// The in-memory form of a configuration: key to raw string value.
///
/// Values are stored as strings. Coercion happens at the conversion edges,
/// never in the stored representation. The `BTreeMap` gives a stable
/// iteration order, so nothing downstream depends on hash ordering.
pub type StructuredDocument = BTreeMap<String, String>;

/// How a value was quoted in the source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStyle {
    #[default]
    None,
    Single,
    Double,
}

/// One `KEY=VALUE` entry extracted from env text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigRecord {
    pub key: String,
    /// Value with one layer of surrounding quotes removed. Escapes are left intact.
    pub value: String,
    /// Comment block directly above the entry, `#` markers stripped, lines joined by `\n`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// 1-based source line; 0 for records that did not come from text.
    pub line: usize,
    pub quote: QuoteStyle,
}

impl ConfigRecord {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            comment: None,
            line: 0,
            quote: QuoteStyle::None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Which channel an issue is reported on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks export.
    Error,
    /// Always shown, never blocks.
    Warning,
    /// Advisory; hidden while errors exist.
    Suggestion,
}

/// A single problem attached to a key or pseudo-field (`line-3`, `conversion`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

impl ValidationIssue {
    pub fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }

    pub fn suggestion(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: Severity::Suggestion,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Payload of a conversion in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ConversionData {
    Document(StructuredDocument),
    Text(String),
}

impl ConversionData {
    pub fn as_document(&self) -> Option<&StructuredDocument> {
        match self {
            ConversionData::Document(doc) => Some(doc),
            ConversionData::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ConversionData::Text(text) => Some(text),
            ConversionData::Document(_) => None,
        }
    }
}

/// Outcome of a conversion. Conversion never fails with `Err`; failures are
/// encoded here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ValidationIssue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl<T> ConversionResult<T> {
    pub fn ok(data: T, warnings: Vec<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            errors: Vec::new(),
            warnings,
        }
    }

    pub fn failed(errors: Vec<ValidationIssue>, warnings: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            errors,
            warnings,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ConversionResult<U> {
        ConversionResult {
            success: self.success,
            data: self.data.map(f),
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

/// Layout knobs for the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    pub group_by_prefix: bool,
    pub sort_within_groups: bool,
    pub add_section_headers: bool,
    pub preserve_empty_lines: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            group_by_prefix: false,
            sort_within_groups: true,
            add_section_headers: true,
            preserve_empty_lines: true,
        }
    }
}

/// Options for the text to structured direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToStructuredOptions {
    /// Re-check URL and numeric values of the produced document.
    pub validate_output: bool,
}

/// Options for the structured to text direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToTextOptions {
    pub include_empty: bool,
    /// Re-parse the generated text as a self-check.
    pub validate_output: bool,
    pub format: FormatOptions,
    /// Text the document was originally read from; used to recover
    /// comments and ordering.
    pub prior_text: Option<String>,
}

/// Export readiness, derived from a validation report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExportReadiness {
    NotReady,
    ReadyWithWarnings,
    Ready,
}

impl ExportReadiness {
    pub fn can_export(self) -> bool {
        !matches!(self, ExportReadiness::NotReady)
    }
}

impl fmt::Display for ExportReadiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportReadiness::NotReady => write!(f, "not ready"),
            ExportReadiness::ReadyWithWarnings => write!(f, "ready with warnings"),
            ExportReadiness::Ready => write!(f, "ready"),
        }
    }
}
