//! Field, document, export and record validation.
//!
//! Issues come in three channels (see [`Severity`]). Errors block export,
//! warnings are always surfaced, suggestions are advisory and hidden while
//! any error exists. Reports keep every issue in a stable order and never
//! truncate; truncation for display is left to [`ValidationReport`]'s
//! `Display` impl or the caller.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;
use url::Url;

use crate::heuristics::{KeyHeuristics, KeyKind, is_port_key};
use crate::normalize::{coerce_bool, is_numeric};
use crate::settings::EngineSettings;
use crate::types::{ConfigRecord, ExportReadiness, Severity, StructuredDocument, ValidationIssue};

/// Errors shown before "...and N more" when a report is displayed.
const DISPLAYED_ERRORS: usize = 3;

const SECRET_MARKERS: &[&str] = &["SECRET", "PASSWORD", "TOKEN", "API_KEY", "PRIVATE_KEY"];
const PLACEHOLDERS: &[&str] = &["changeme", "change_me", "todo", "tbd", "xxx", "placeholder", "replace_me"];
const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1", "0.0.0.0", "[::1]"];

/// Classified issues from a validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub suggestions: Vec<ValidationIssue>,
}

/// Issues for a single field, split by channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldIssues<'a> {
    pub errors: Vec<&'a str>,
    pub warnings: Vec<&'a str>,
    pub suggestions: Vec<&'a str>,
}

impl ValidationReport {
    pub(crate) fn push(&mut self, issue: ValidationIssue) {
        match issue.severity {
            Severity::Error => self.errors.push(issue),
            Severity::Warning => self.warnings.push(issue),
            Severity::Suggestion => self.suggestions.push(issue),
        }
    }

    fn extend(&mut self, issues: impl IntoIterator<Item = ValidationIssue>) {
        for issue in issues {
            self.push(issue);
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn readiness(&self) -> ExportReadiness {
        if !self.errors.is_empty() {
            ExportReadiness::NotReady
        } else if !self.warnings.is_empty() {
            ExportReadiness::ReadyWithWarnings
        } else {
            ExportReadiness::Ready
        }
    }

    /// Suggestions, or nothing while errors take priority.
    pub fn visible_suggestions(&self) -> &[ValidationIssue] {
        if self.has_errors() {
            &[]
        } else {
            &self.suggestions
        }
    }

    /// Messages grouped by field name.
    pub fn by_field(&self) -> BTreeMap<&str, FieldIssues<'_>> {
        let mut fields: BTreeMap<&str, FieldIssues<'_>> = BTreeMap::new();
        for issue in self.errors.iter().chain(&self.warnings).chain(&self.suggestions) {
            let entry = fields.entry(issue.field.as_str()).or_default();
            let bucket = match issue.severity {
                Severity::Error => &mut entry.errors,
                Severity::Warning => &mut entry.warnings,
                Severity::Suggestion => &mut entry.suggestions,
            };
            bucket.push(issue.message.as_str());
        }
        fields
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.readiness())?;
        if self.has_errors() {
            write!(f, " ({} error(s))", self.errors.len())?;
            for issue in self.errors.iter().take(DISPLAYED_ERRORS) {
                write!(f, "\n  - {issue}")?;
            }
            if self.errors.len() > DISPLAYED_ERRORS {
                write!(f, "\n  ...and {} more", self.errors.len() - DISPLAYED_ERRORS)?;
            }
        } else if !self.warnings.is_empty() {
            write!(f, " ({} warning(s))", self.warnings.len())?;
        }
        Ok(())
    }
}

/// Rule set shared by every validation entry point.
#[derive(Debug, Clone)]
pub struct Validator {
    heuristics: KeyHeuristics,
    max_value_length: usize,
    min_secret_length: usize,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(&EngineSettings::default())
    }
}

impl Validator {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            heuristics: KeyHeuristics::from_settings(&settings.heuristics),
            max_value_length: settings.max_value_length,
            min_secret_length: settings.min_secret_length,
        }
    }

    pub fn with_heuristics(mut self, heuristics: KeyHeuristics) -> Self {
        self.heuristics = heuristics;
        self
    }

    /// Check one key/value pair.
    pub fn validate_field(&self, key: &str, value: &str) -> Vec<ValidationIssue> {
        let mut issues = self.validate_key(key);
        if key.trim().is_empty() {
            return issues;
        }
        self.validate_value(key, value, &mut issues);
        issues
    }

    /// Check a whole document. Empty values are warnings here.
    pub fn validate_config(&self, document: &StructuredDocument) -> ValidationReport {
        let mut report = ValidationReport::default();
        if document.is_empty() {
            report.push(ValidationIssue::warning("config", "Configuration has no entries"));
        }
        for (key, value) in document {
            report.extend(self.validate_field(key, value));
            if value.trim().is_empty() {
                report.push(ValidationIssue::warning(key.as_str(), "Value is empty"));
            }
        }
        report
    }

    /// Stricter pass run before a final save or export.
    ///
    /// On top of [`validate_config`](Self::validate_config): an empty
    /// document, empty values and placeholder values are errors, and URLs
    /// that point at the local machine are warnings.
    pub fn validate_for_export(&self, document: &StructuredDocument) -> ValidationReport {
        let mut report = ValidationReport::default();
        if document.is_empty() {
            report.push(ValidationIssue::error("config", "Configuration has no entries to export"));
        }
        for (key, value) in document {
            report.extend(self.validate_field(key, value));
            let trimmed = value.trim();
            if trimmed.is_empty() {
                report.push(ValidationIssue::error(key.as_str(), "Value is required for export"));
                continue;
            }
            if is_placeholder(trimmed) {
                report.push(ValidationIssue::error(
                    key.as_str(),
                    "Placeholder value must be replaced before export",
                ));
            }
            if self.heuristics.kind_of(key) == KeyKind::Url && points_to_local_host(trimmed) {
                report.push(ValidationIssue::warning(
                    key.as_str(),
                    "URL points to the local machine",
                ));
            }
        }
        report
    }

    /// Check parsed records, including duplicates a document cannot show.
    pub fn validate_env_variables(&self, records: &[ConfigRecord]) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let mut first_seen: HashMap<&str, usize> = HashMap::new();

        for (index, record) in records.iter().enumerate() {
            if record.key.trim().is_empty() {
                let field = if record.line > 0 {
                    format!("line-{}", record.line)
                } else {
                    format!("record-{}", index + 1)
                };
                issues.push(ValidationIssue::error(field, "Key cannot be empty"));
                continue;
            }
            if let Some(first) = first_seen.get(record.key.as_str()) {
                issues.push(ValidationIssue::error(
                    record.key.as_str(),
                    format!("Duplicate key (first defined in record {first})"),
                ));
            } else {
                first_seen.insert(record.key.as_str(), index + 1);
            }
            issues.extend(self.validate_field(&record.key, &record.value));
        }
        issues
    }

    fn validate_key(&self, key: &str) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if key.trim().is_empty() {
            issues.push(ValidationIssue::error(key, "Key cannot be empty"));
            return issues;
        }
        let mut chars = key.chars();
        let valid_start = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            issues.push(ValidationIssue::error(
                key,
                "Key must start with a letter or underscore and contain only letters, digits and underscores",
            ));
        } else if key.chars().any(|c| c.is_ascii_lowercase()) {
            issues.push(ValidationIssue::suggestion(
                key,
                "Environment variable names are conventionally UPPER_SNAKE_CASE",
            ));
        }
        issues
    }

    fn validate_value(&self, key: &str, value: &str, issues: &mut Vec<ValidationIssue>) {
        if value.contains('\n') || value.contains('\r') {
            issues.push(ValidationIssue::warning(key, "Value contains newline characters"));
        }
        if value.chars().count() > self.max_value_length {
            issues.push(ValidationIssue::warning(
                key,
                format!("Value is longer than {} characters", self.max_value_length),
            ));
        }

        let trimmed = value.trim();
        if trimmed.is_empty() {
            return;
        }

        match self.heuristics.kind_of(key) {
            KeyKind::Boolean if coerce_bool(trimmed).is_none() => {
                issues.push(ValidationIssue::warning(
                    key,
                    "Expected a boolean value (true/false, yes/no, on/off, 1/0)",
                ));
            }
            KeyKind::Numeric => {
                if !is_numeric(trimmed) {
                    issues.push(ValidationIssue::error(key, "Must be a numeric value"));
                } else if is_port_key(key)
                    && !trimmed.parse::<u32>().is_ok_and(|p| (1..=65535).contains(&p))
                {
                    issues.push(ValidationIssue::error(key, "Port must be between 1 and 65535"));
                }
            }
            KeyKind::Url => match Url::parse(trimmed) {
                Ok(url) if !url.cannot_be_a_base() => {
                    if url.scheme() == "http" && !points_to_local_host(trimmed) {
                        issues.push(ValidationIssue::suggestion(key, "Consider using HTTPS"));
                    }
                }
                _ => issues.push(ValidationIssue::error(key, "Invalid URL format")),
            },
            _ => {}
        }

        let upper = key.to_ascii_uppercase();
        if SECRET_MARKERS.iter().any(|m| upper.contains(m))
            && trimmed.chars().count() < self.min_secret_length
            && !is_placeholder(trimmed)
        {
            issues.push(ValidationIssue::suggestion(
                key,
                format!(
                    "Secret looks short; use at least {} characters",
                    self.min_secret_length
                ),
            ));
        }
    }
}

fn is_placeholder(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    PLACEHOLDERS.contains(&lower.as_str())
        || lower.starts_with("your_")
        || lower.starts_with("your-")
        || (lower.starts_with('<') && lower.ends_with('>'))
}

fn points_to_local_host(value: &str) -> bool {
    Url::parse(value)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .is_some_and(|host| LOCAL_HOSTS.contains(&host.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::doc;

    fn validator() -> Validator {
        Validator::default()
    }

    fn messages(issues: &[ValidationIssue]) -> Vec<&str> {
        issues.iter().map(|i| i.message.as_str()).collect()
    }

    #[test]
    fn clean_field_has_no_issues() {
        assert!(validator().validate_field("APP_NAME", "gigboard").is_empty());
    }

    #[test]
    fn empty_key_is_error() {
        let issues = validator().validate_field("  ", "x");
        assert_eq!(issues.len(), 1);
        assert!(issues[0].is_error());
    }

    #[test]
    fn invalid_key_characters() {
        let issues = validator().validate_field("1BAD-KEY", "x");
        assert!(issues[0].is_error());
        assert!(issues[0].message.contains("must start with a letter"));
    }

    #[test]
    fn lowercase_key_gets_suggestion() {
        let issues = validator().validate_field("app_name", "x");
        assert_eq!(issues[0].severity, Severity::Suggestion);
    }

    #[test]
    fn invalid_url_is_error() {
        let issues = validator().validate_field("API_URL", "not a url");
        assert_eq!(messages(&issues), vec!["Invalid URL format"]);
        let issues = validator().validate_field("API_URL", "localhost:5432");
        assert_eq!(messages(&issues), vec!["Invalid URL format"]);
    }

    #[test]
    fn plain_http_gets_suggestion_unless_local() {
        let issues = validator().validate_field("API_URL", "http://example.com");
        assert_eq!(issues[0].severity, Severity::Suggestion);
        assert!(validator().validate_field("API_URL", "http://localhost:3000").is_empty());
    }

    #[test]
    fn numeric_and_port_checks() {
        let v = validator();
        assert_eq!(messages(&v.validate_field("POOL_SIZE", "ten")), vec!["Must be a numeric value"]);
        assert_eq!(
            messages(&v.validate_field("DB_PORT", "0")),
            vec!["Port must be between 1 and 65535"]
        );
        assert!(v.validate_field("DB_PORT", "5432").is_empty());
    }

    #[test]
    fn non_boolean_is_warning() {
        let issues = validator().validate_field("ENABLE_X", "maybe");
        assert_eq!(issues[0].severity, Severity::Warning);
    }

    #[test]
    fn short_secret_gets_suggestion() {
        let issues = validator().validate_field("JWT_SECRET", "abc");
        assert_eq!(issues[0].severity, Severity::Suggestion);
        assert!(validator().validate_field("JWT_SECRET", "a-long-enough-secret").is_empty());
    }

    #[test]
    fn config_empty_values_are_warnings() {
        let report = validator().validate_config(&doc(&[("A", ""), ("B", "1")]));
        assert!(report.errors.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.readiness(), ExportReadiness::ReadyWithWarnings);
    }

    #[test]
    fn export_is_stricter() {
        let d = doc(&[("A", ""), ("TOKEN", "changeme"), ("API_URL", "http://localhost/")]);
        let report = validator().validate_for_export(&d);
        let fields: Vec<_> = report.errors.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, vec!["A", "TOKEN"]);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].field, "API_URL");
    }

    #[test]
    fn empty_document_export_is_error() {
        let report = validator().validate_for_export(&StructuredDocument::new());
        assert_eq!(report.readiness(), ExportReadiness::NotReady);
        let report = validator().validate_config(&StructuredDocument::new());
        assert_eq!(report.readiness(), ExportReadiness::ReadyWithWarnings);
    }

    #[test]
    fn readiness_transitions() {
        let v = validator();
        // 1 error (bad port), 2 warnings (non-boolean, localhost URL)
        let mut d = doc(&[
            ("DB_PORT", "99999"),
            ("ENABLE_X", "maybe"),
            ("API_URL", "https://localhost/"),
        ]);
        let report = v.validate_for_export(&d);
        assert_eq!((report.errors.len(), report.warnings.len()), (1, 2));
        assert_eq!(report.readiness(), ExportReadiness::NotReady);

        d.insert("DB_PORT".into(), "5432".into());
        let report = v.validate_for_export(&d);
        assert_eq!((report.errors.len(), report.warnings.len()), (0, 2));
        assert_eq!(report.readiness(), ExportReadiness::ReadyWithWarnings);

        d.insert("ENABLE_X".into(), "true".into());
        d.insert("API_URL".into(), "https://api.example.com/".into());
        assert_eq!(v.validate_for_export(&d).readiness(), ExportReadiness::Ready);
    }

    #[test]
    fn suggestions_hidden_while_errors_exist() {
        let v = validator();
        let report = v.validate_config(&doc(&[("API_URL", "http://example.com"), ("DB_PORT", "x")]));
        assert_eq!(report.suggestions.len(), 1);
        assert!(report.visible_suggestions().is_empty());

        let report = v.validate_config(&doc(&[("API_URL", "http://example.com")]));
        assert_eq!(report.visible_suggestions().len(), 1);
    }

    #[test]
    fn by_field_groups_messages() {
        let report = validator().validate_config(&doc(&[("DB_PORT", "x"), ("ENABLE_X", "")]));
        let fields = report.by_field();
        assert_eq!(fields["DB_PORT"].errors, vec!["Must be a numeric value"]);
        assert_eq!(fields["ENABLE_X"].warnings, vec!["Value is empty"]);
    }

    #[test]
    fn display_truncates_after_three_errors() {
        let d = doc(&[("A_PORT", "x"), ("B_PORT", "x"), ("C_PORT", "x"), ("D_PORT", "x"), ("E_PORT", "x")]);
        let shown = validator().validate_config(&d).to_string();
        assert!(shown.starts_with("not ready (5 error(s))"));
        assert!(shown.contains("A_PORT: Must be a numeric value"));
        assert!(!shown.contains("D_PORT"));
        assert!(shown.ends_with("...and 2 more"));
    }

    #[test]
    fn records_report_duplicates_and_empty_keys() {
        let records = vec![
            ConfigRecord::new("A", "1"),
            ConfigRecord::new("A", "2"),
            ConfigRecord::new("", "x"),
        ];
        let issues = validator().validate_env_variables(&records);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].field, "A");
        assert!(issues[0].message.contains("Duplicate key"));
        assert_eq!(issues[1].field, "record-3");
    }

    #[test]
    fn records_include_value_checks() {
        let records = vec![ConfigRecord::new("DB_PORT", "abc")];
        let issues = validator().validate_env_variables(&records);
        assert_eq!(messages(&issues), vec!["Must be a numeric value"]);
    }

    #[test]
    fn report_serializes_by_channel() {
        let report = validator().validate_config(&doc(&[("DB_PORT", "x")]));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["errors"][0]["field"], "DB_PORT");
        assert_eq!(json["errors"][0]["severity"], "error");
    }
}
