//! Conversion entry points.
//!
//! [`Converter`] composes the tokenizer, normalizer and generator. Every
//! public method returns a [`ConversionResult`]; internal failures are
//! caught here and reported as a `conversion` issue instead of escaping to
//! the caller.
//!
//! Structural success is independent of semantic validity: a document with
//! a malformed URL still converts, with a warning. Full validation is the
//! job of [`crate::Validator`].

use tracing::{debug, warn};

use crate::error::EnvfigError;
use crate::generate::Generator;
use crate::heuristics::{KeyHeuristics, KeyKind, is_port_key};
use crate::normalize::{self, Normalizer};
use crate::parser::{self, ParseMode, ParseOutcome};
use crate::settings::EngineSettings;
use crate::types::{
    ConfigRecord, ConversionData, ConversionResult, QuoteStyle, StructuredDocument,
    ToStructuredOptions, ToTextOptions, ValidationIssue,
};

const SHELL_SPECIAL: &[char] = &['$', '`', '!', '|', '&', ';', '<', '>', '(', ')'];

/// Input for [`Converter::convert_with_error_recovery`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionRequest {
    /// Raw env file bytes, expected to be UTF-8.
    Text {
        input: Vec<u8>,
        options: ToStructuredOptions,
    },
    Document {
        document: StructuredDocument,
        options: ToTextOptions,
    },
}

/// Stateless converter between env text and structured documents.
#[derive(Debug, Clone)]
pub struct Converter {
    normalizer: Normalizer,
    generator: Generator,
    max_value_length: usize,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(&EngineSettings::default())
    }
}

impl Converter {
    pub fn new(settings: &EngineSettings) -> Self {
        let heuristics = KeyHeuristics::from_settings(&settings.heuristics);
        Self {
            normalizer: Normalizer::new(heuristics.clone()),
            generator: Generator::new(heuristics),
            max_value_length: settings.max_value_length,
        }
    }

    /// Use explicit heuristic tables instead of the built-in ones.
    pub fn with_heuristics(mut self, heuristics: KeyHeuristics) -> Self {
        self.normalizer = Normalizer::new(heuristics.clone());
        self.generator = Generator::new(heuristics);
        self
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Tokenize without normalizing. Records keep their comments and lines.
    pub fn parse_env_text(&self, text: &str) -> ParseOutcome {
        parser::parse(text, ParseMode::Strict)
    }

    /// Env text to structured document.
    ///
    /// Malformed lines are returned in `errors` alongside the document built
    /// from the good lines. Only input with errors and no usable line at all
    /// fails.
    pub fn text_to_structured(
        &self,
        text: &str,
        options: ToStructuredOptions,
    ) -> ConversionResult<StructuredDocument> {
        let outcome = parser::parse(text, ParseMode::Strict);
        if outcome.records.is_empty() && !outcome.errors.is_empty() {
            return ConversionResult::failed(outcome.errors, Vec::new());
        }

        let mut warnings = Vec::new();
        let document = self.build_document(&outcome.records, &mut warnings);
        if options.validate_output {
            self.check_output_values(&document, &mut warnings);
        }

        let mut result = ConversionResult::ok(document, warnings);
        result.errors = outcome.errors;
        result
    }

    /// Structured document to env text.
    ///
    /// `data` holds the generated text whenever generation itself worked,
    /// even if `success` is false because of unwritable keys or a failed
    /// self-check.
    pub fn structured_to_text(
        &self,
        document: StructuredDocument,
        options: &ToTextOptions,
    ) -> ConversionResult<String> {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();
        let mut writable = StructuredDocument::new();

        for (key, value) in document {
            if !options.include_empty && value.is_empty() {
                warnings.push(format!("Skipped {key} because its value is empty"));
                continue;
            }
            if let Some(reason) = unwritable_key(&key) {
                errors.push(ValidationIssue::error(key, reason));
                continue;
            }
            if value.contains('\n') || value.contains('\r') {
                warnings.push(format!(
                    "{key} contains newline characters and will not survive a round trip"
                ));
            }
            if value.contains(SHELL_SPECIAL) {
                warnings.push(format!(
                    "{key} contains shell-special characters that may be expanded by a shell"
                ));
            }
            if value.chars().count() > self.max_value_length {
                warnings.push(format!(
                    "{key} is longer than {} characters",
                    self.max_value_length
                ));
            }
            writable.insert(key, value);
        }

        let text = match self.generator.generate(
            &writable,
            options.prior_text.as_deref(),
            &options.format,
        ) {
            Ok(text) => text,
            Err(e) => return conversion_failure(e, warnings),
        };

        if options.validate_output {
            errors.extend(self_check(&text, &writable));
            if !errors.is_empty() {
                warn!(errors = errors.len(), "generated env text failed its self-check");
            }
        }

        ConversionResult {
            success: errors.is_empty(),
            data: Some(text),
            errors,
            warnings,
        }
    }

    /// Run the primary conversion; if it fails unexpectedly on text input,
    /// fall back to a lenient line-by-line extraction.
    pub fn convert_with_error_recovery(
        &self,
        request: ConversionRequest,
    ) -> ConversionResult<ConversionData> {
        match request {
            ConversionRequest::Text { input, options } => match self.try_convert_text(&input, options) {
                Ok(result) => result.map(ConversionData::Document),
                Err(e) => {
                    warn!(error = %e, "primary conversion failed, recovering line by line");
                    self.recover_text(&input, &e).map(ConversionData::Document)
                }
            },
            ConversionRequest::Document { document, options } => self
                .structured_to_text(document, &options)
                .map(ConversionData::Text),
        }
    }

    fn try_convert_text(
        &self,
        input: &[u8],
        options: ToStructuredOptions,
    ) -> Result<ConversionResult<StructuredDocument>, EnvfigError> {
        let text = std::str::from_utf8(input)?;
        Ok(self.text_to_structured(text, options))
    }

    /// Best-effort extraction: undecodable lines are dropped, malformed lines
    /// are skipped without being reported.
    fn recover_text(&self, input: &[u8], cause: &EnvfigError) -> ConversionResult<StructuredDocument> {
        let mut dropped = 0usize;
        let decoded: Vec<&str> = input
            .split(|b| *b == b'\n')
            .map(|line| match std::str::from_utf8(line) {
                Ok(line) => line,
                Err(_) => {
                    dropped += 1;
                    // Placeholder parses as a malformed line, so a comment
                    // above it is not carried over to the next entry.
                    "\u{0}"
                }
            })
            .collect();

        let outcome = parser::parse(&decoded.join("\n"), ParseMode::Lenient);
        let mut warnings = vec![format!("Recovered from conversion error: {cause}")];
        if dropped > 0 {
            warnings.push(format!("Dropped {dropped} line(s) that were not valid UTF-8"));
        }

        let document = self.build_document(&outcome.records, &mut warnings);
        if document.is_empty() {
            return ConversionResult::failed(
                vec![ValidationIssue::error("conversion", cause.to_string())],
                warnings,
            );
        }
        ConversionResult::ok(document, warnings)
    }

    fn build_document(&self, records: &[ConfigRecord], warnings: &mut Vec<String>) -> StructuredDocument {
        let mut document = StructuredDocument::new();
        for record in records {
            let normalized = self
                .normalizer
                .normalize_record(&record.key, &record.value, record.quote);
            warnings.extend(normalized.warnings);
            if document.insert(record.key.clone(), normalized.value).is_some() {
                debug!(key = %record.key, line = record.line, "duplicate key overrides earlier value");
                warnings.push(format!(
                    "Duplicate key {} on line {} overrides an earlier value",
                    record.key, record.line
                ));
            }
        }
        document
    }

    fn check_output_values(&self, document: &StructuredDocument, warnings: &mut Vec<String>) {
        let heuristics = self.normalizer.heuristics();
        for (key, value) in document {
            if value.is_empty() {
                continue;
            }
            match heuristics.kind_of(key) {
                KeyKind::Url if normalize::normalize_url(value).is_none() => {
                    warnings.push(format!("{key} is not a valid URL"));
                }
                KeyKind::Numeric if is_port_key(key) => {
                    if !value.parse::<u32>().is_ok_and(|p| (1..=65535).contains(&p)) {
                        warnings.push(format!("{key} is not a valid port number"));
                    }
                }
                _ => {}
            }
        }
    }
}

/// Why a key cannot be expressed as `KEY=VALUE`, if it cannot.
fn unwritable_key(key: &str) -> Option<&'static str> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        Some("Key cannot be empty")
    } else if trimmed != key {
        Some("Key cannot have leading or trailing whitespace")
    } else if key.contains('=') {
        Some("Key cannot contain '='")
    } else if key.contains('\n') || key.contains('\r') {
        Some("Key cannot contain newline characters")
    } else if key.starts_with('#') {
        Some("Key cannot start with '#'")
    } else {
        None
    }
}

/// Re-parse generated text and confirm every key reads back unchanged.
fn self_check(text: &str, expected: &StructuredDocument) -> Vec<ValidationIssue> {
    let outcome = parser::parse(text, ParseMode::Strict);
    let mut issues: Vec<ValidationIssue> = outcome
        .errors
        .into_iter()
        .map(|issue| ValidationIssue::error(issue.field, format!("self-check: {}", issue.message)))
        .collect();

    let mut read_back = StructuredDocument::new();
    for record in outcome.records {
        let value = match record.quote {
            QuoteStyle::Double => normalize::unescape(&record.value),
            QuoteStyle::Single | QuoteStyle::None => record.value,
        };
        read_back.insert(record.key, value);
    }

    for (key, value) in expected {
        if read_back.get(key) != Some(value) {
            issues.push(ValidationIssue::error(
                key.clone(),
                "self-check: generated text does not read back the same value",
            ));
        }
    }
    issues
}

fn conversion_failure<T>(error: EnvfigError, warnings: Vec<String>) -> ConversionResult<T> {
    warn!(error = %error, "conversion failed");
    ConversionResult::failed(
        vec![ValidationIssue::error("conversion", error.to_string())],
        warnings,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{SAMPLE_ENV, doc};
    use crate::types::FormatOptions;

    fn converter() -> Converter {
        Converter::default()
    }

    #[test]
    fn text_with_comment_to_structured() {
        let c = converter();
        let text = "FOO=bar\n# a comment\nBAZ=1\n";
        let result = c.text_to_structured(text, ToStructuredOptions::default());
        assert!(result.success);
        assert!(result.errors.is_empty());
        assert_eq!(result.data, Some(doc(&[("FOO", "bar"), ("BAZ", "1")])));
        assert_eq!(c.parse_env_text(text).comment_for("BAZ"), Some("a comment"));
    }

    #[test]
    fn boolean_key_is_coerced() {
        let result = converter().text_to_structured("ENABLE_X=yes\n", ToStructuredOptions::default());
        assert_eq!(result.data.unwrap()["ENABLE_X"], "true");
    }

    #[test]
    fn malformed_lines_do_not_abort() {
        let result = converter().text_to_structured("=noKey\nGOOD=val\n", ToStructuredOptions::default());
        assert!(result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field, "line-1");
        assert_eq!(result.data, Some(doc(&[("GOOD", "val")])));
    }

    #[test]
    fn only_malformed_lines_fail() {
        let result = converter().text_to_structured("nope\n=x\n", ToStructuredOptions::default());
        assert!(!result.success);
        assert!(result.data.is_none());
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn empty_text_is_an_empty_document() {
        let result = converter().text_to_structured("", ToStructuredOptions::default());
        assert!(result.success);
        assert_eq!(result.data, Some(StructuredDocument::new()));
    }

    #[test]
    fn duplicate_key_warns_and_last_wins() {
        let result = converter().text_to_structured("A=1\nA=2\n", ToStructuredOptions::default());
        assert_eq!(result.data.unwrap()["A"], "2");
        assert!(result.warnings.iter().any(|w| w.contains("Duplicate key A on line 2")));
    }

    #[test]
    fn double_quoted_values_are_unescaped() {
        let result = converter().text_to_structured(r#"MSG="say \"hi\"""#, ToStructuredOptions::default());
        assert_eq!(result.data.unwrap()["MSG"], r#"say "hi""#);
    }

    #[test]
    fn validate_output_flags_bad_url_and_port() {
        let options = ToStructuredOptions { validate_output: true };
        let result = converter().text_to_structured("API_URL=nope\nDB_PORT=70000\n", options);
        assert!(result.success);
        assert!(result.warnings.iter().any(|w| w.contains("API_URL is not a valid URL")));
        assert!(result.warnings.iter().any(|w| w.contains("DB_PORT is not a valid port")));
    }

    #[test]
    fn newline_value_warns() {
        let result = converter().structured_to_text(doc(&[("NOTE", "line1\nline2")]), &ToTextOptions::default());
        assert!(result.success);
        assert!(result.warnings.iter().any(|w| w.contains("NOTE") && w.contains("newline characters")));
    }

    #[test]
    fn newline_value_fails_self_check() {
        let options = ToTextOptions {
            validate_output: true,
            ..ToTextOptions::default()
        };
        let result = converter().structured_to_text(doc(&[("NOTE", "line1\nline2")]), &options);
        assert!(!result.success);
        assert!(result.data.is_some());
        assert!(result.errors.iter().all(|e| e.message.starts_with("self-check")));
    }

    #[test]
    fn empty_values_skipped_unless_included() {
        let d = doc(&[("A", ""), ("B", "1")]);
        let skipped = converter().structured_to_text(d.clone(), &ToTextOptions::default());
        assert_eq!(skipped.data.as_deref(), Some("B=1\n"));
        assert!(skipped.warnings[0].contains("Skipped A"));

        let options = ToTextOptions {
            include_empty: true,
            ..ToTextOptions::default()
        };
        let included = converter().structured_to_text(d, &options);
        assert_eq!(included.data.as_deref(), Some("A=\"\"\nB=1\n"));
    }

    #[test]
    fn shell_special_and_length_warnings() {
        let long = "x".repeat(1001);
        let d = doc(&[("CMD", "$(whoami)"), ("BLOB", long.as_str())]);
        let result = converter().structured_to_text(d, &ToTextOptions::default());
        assert!(result.warnings.iter().any(|w| w.contains("CMD contains shell-special")));
        assert!(result.warnings.iter().any(|w| w.contains("BLOB is longer than 1000")));
    }

    #[test]
    fn unwritable_key_is_an_error() {
        let d = doc(&[("BAD=KEY", "x"), ("GOOD", "y")]);
        let result = converter().structured_to_text(d, &ToTextOptions::default());
        assert!(!result.success);
        assert_eq!(result.errors[0].field, "BAD=KEY");
        assert_eq!(result.data.as_deref(), Some("GOOD=y\n"));
    }

    #[test]
    fn self_check_passes_for_tricky_values() {
        let d = doc(&[("A", r#"quote " and \ slash"#), ("B", "# not a comment"), ("C", "'x'")]);
        let options = ToTextOptions {
            validate_output: true,
            ..ToTextOptions::default()
        };
        let result = converter().structured_to_text(d, &options);
        assert!(result.success, "{:?}", result.errors);
    }

    #[test]
    fn grouped_output_with_headers() {
        let options = ToTextOptions {
            format: FormatOptions {
                group_by_prefix: true,
                sort_within_groups: true,
                add_section_headers: true,
                preserve_empty_lines: true,
            },
            ..ToTextOptions::default()
        };
        let d = doc(&[("OAUTH_ID", "x"), ("OAUTH_SECRET", "y"), ("FOO", "z")]);
        let text = converter().structured_to_text(d, &options).data.unwrap();
        let foo = text.find("FOO=z").unwrap();
        let header = text.find("# Oauth Configuration").unwrap();
        let id = text.find("OAUTH_ID=x").unwrap();
        let secret = text.find("OAUTH_SECRET=y").unwrap();
        assert!(foo < header && header < id && id < secret);
    }

    #[test]
    fn edit_preserves_comments_and_order() {
        let c = converter();
        let mut d = c
            .text_to_structured(SAMPLE_ENV, ToStructuredOptions::default())
            .data
            .unwrap();
        d.insert("APP_NAME".into(), "renamed".into());
        let options = ToTextOptions {
            prior_text: Some(SAMPLE_ENV.to_string()),
            ..ToTextOptions::default()
        };
        let text = c.structured_to_text(d, &options).data.unwrap();
        assert!(text.contains("# Primary database\nDATABASE_URL="));
        assert!(text.contains("APP_NAME=renamed"));
        assert!(text.find("APP_NAME").unwrap() < text.find("DATABASE_URL").unwrap());
    }

    #[test]
    fn recovery_from_invalid_utf8() {
        let mut input = b"GOOD=1\nBAD=".to_vec();
        input.extend_from_slice(&[0xff, 0xfe]);
        input.extend_from_slice(b"\nALSO_GOOD=2\n");
        let result = converter().convert_with_error_recovery(ConversionRequest::Text {
            input,
            options: ToStructuredOptions::default(),
        });
        assert!(result.success);
        let data = result.data.unwrap();
        let d = data.as_document().unwrap();
        assert_eq!(d.len(), 2);
        assert_eq!(d["ALSO_GOOD"], "2");
        assert!(result.warnings.iter().any(|w| w.contains("Dropped 1 line")));
    }

    #[test]
    fn recovery_with_nothing_usable_fails() {
        let result = converter().convert_with_error_recovery(ConversionRequest::Text {
            input: vec![0xff, b'\n', b'x'],
            options: ToStructuredOptions::default(),
        });
        assert!(!result.success);
        assert_eq!(result.errors[0].field, "conversion");
    }

    #[test]
    fn recovery_unescapes_double_quoted_values() {
        let mut input = br#"MSG="a \"b\"""#.to_vec();
        input.extend_from_slice(b"\n\xff\n");
        let result = converter().convert_with_error_recovery(ConversionRequest::Text {
            input,
            options: ToStructuredOptions::default(),
        });
        let data = result.data.unwrap();
        assert_eq!(data.as_document().unwrap()["MSG"], r#"a "b""#);
    }

    #[test]
    fn recovery_request_uses_primary_path_when_valid() {
        let result = converter().convert_with_error_recovery(ConversionRequest::Text {
            input: b"A=1\n".to_vec(),
            options: ToStructuredOptions::default(),
        });
        assert!(result.success);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn document_request_generates_text() {
        let result = converter().convert_with_error_recovery(ConversionRequest::Document {
            document: doc(&[("A", "1")]),
            options: ToTextOptions::default(),
        });
        assert_eq!(result.data.unwrap().as_text(), Some("A=1\n"));
    }

    #[test]
    fn injected_heuristics_are_used() {
        let mut heuristics = KeyHeuristics::default();
        heuristics.boolean_keys.insert("DARK_MODE".into());
        let c = Converter::default().with_heuristics(heuristics);
        let result = c.text_to_structured("DARK_MODE=on\n", ToStructuredOptions::default());
        assert_eq!(result.data.unwrap()["DARK_MODE"], "true");
    }
}
