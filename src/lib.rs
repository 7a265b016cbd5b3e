//! Lossless conversion between `KEY=VALUE` env files and structured
//! configuration, with a validation pipeline for editors.
//!
//! Envfig reads the env dialect most applications ship with (`KEY=VALUE`,
//! `#` comments, optional quotes) into a typed key/value document, lets the
//! application edit that document, and writes it back without losing the
//! comments and layout the user wrote.
//!
//! ```ignore
//! let converter = Converter::default();
//! let parsed = converter.text_to_structured(&text, ToStructuredOptions::default());
//! let mut doc = parsed.data.unwrap_or_default();
//! doc.insert("APP_PORT".into(), "8080".into());
//!
//! let options = ToTextOptions { prior_text: Some(text), ..Default::default() };
//! let written = converter.structured_to_text(doc, &options);
//! ```
//!
//! # Pipeline
//!
//! ```text
//! text ──▶ parser ──▶ records ──▶ normalize ──▶ StructuredDocument ──▶ validate
//!                                                     │
//! text ◀── generate ◀─────────────────────────────────┘
//! ```
//!
//! - **[`parser`]** splits text into lines and classifies each one. A bad
//!   line is reported as a `line-<n>` issue and skipped; the rest of the
//!   input still parses. Comments directly above an entry are attached to it.
//! - **[`normalize`]** coerces values by key name: `ENABLE_*` and `*_FLAG*`
//!   keys become `true`/`false`, `*_PORT`/`*_SIZE`/... keys are checked for
//!   numbers, `*_URL`/`*_ENDPOINT` keys are re-serialised through a URL
//!   parser. It also owns quoting and escaping.
//! - **[`generate`]** turns a document back into text, either in the order
//!   of the text it came from or grouped by namespace prefix with section
//!   headers. Output is byte-for-byte deterministic.
//! - **[`Converter`]** exposes the conversion entry points and never lets an
//!   internal failure escape: everything comes back as a
//!   [`ConversionResult`].
//! - **[`Validator`]** and **[`ValidationSession`]** classify issues as
//!   errors, warnings and suggestions and derive an [`ExportReadiness`].
//!
//! # The env dialect
//!
//! One entry per `\n`-delimited line. The key is everything before the first
//! `=`, the value everything after, both trimmed. A value wrapped in one
//! matching pair of `"` or `'` has that pair removed; inside double quotes
//! `\\` and `\"` are escapes. When writing, a value is double-quoted if it is
//! empty or contains whitespace, `#`, quotes, a backslash, `` ` `` or `$`.
//!
//! Not supported on purpose: `export` prefixes, inline comments after a
//! value, multi-line values, and variable interpolation.
//!
//! # Heuristics instead of a schema
//!
//! Nothing declares which keys exist or what type they hold. The type of a
//! key is inferred from its name using the tables in [`heuristics`]. Those
//! tables are plain values: pass your own [`KeyHeuristics`] to the
//! converter and validator, or extend the built-in ones from
//! [`EngineSettings`].
//!
//! # Round trips
//!
//! `text_to_structured(structured_to_text(doc))` reproduces `doc` for any
//! key that can be written as `KEY=VALUE` and any value without newlines,
//! up to the normalisation above (which is idempotent). With
//! `validate_output` set, [`Converter::structured_to_text`] re-reads its own
//! output and fails if any value does not come back unchanged.
//!
//! # Validation
//!
//! | Channel | Blocks export | Shown |
//! |---------|---------------|-------|
//! | error | yes | always |
//! | warning | no | always |
//! | suggestion | no | only while there are no errors |
//!
//! [`Validator::validate_for_export`] is the strict pass run right before
//! a save; [`Validator::validate_config`] is the lenient one for live
//! feedback. For per-keystroke feedback, [`ValidationSession`] debounces
//! field validation with last-request-wins semantics per field, driven by
//! an injectable [`Clock`].
//!
//! # Settings
//!
//! [`SettingsLoader`] resolves [`EngineSettings`] from compiled defaults, an
//! optional TOML snippet and `ENVFIG__*` environment variables. Unknown keys
//! in the TOML layer are rejected with their line number unless strict mode
//! is turned off.
//!
//! # Logging
//!
//! Envfig emits `tracing` events (skipped lines, duplicate keys, recovery,
//! stale debounced runs) and never installs a subscriber.

pub mod error;
pub mod generate;
pub mod heuristics;
pub mod normalize;
pub mod parser;
pub mod types;

mod convert;
mod session;
mod settings;
mod validate;

#[cfg(test)]
mod fixtures;

pub use convert::{ConversionRequest, Converter};
pub use error::EnvfigError;
pub use generate::Generator;
pub use heuristics::{KeyHeuristics, KeyKind};
pub use normalize::{Normalized, Normalizer};
pub use parser::{ParseMode, ParseOutcome};
pub use session::{Clock, ManualClock, SystemClock, ValidationSession, ValidationTicket};
pub use settings::{EngineSettings, HeuristicSettings, SettingsLoader};
pub use types::{
    ConfigRecord, ConversionData, ConversionResult, ExportReadiness, FormatOptions, QuoteStyle,
    Severity, StructuredDocument, ToStructuredOptions, ToTextOptions, ValidationIssue,
};
pub use validate::{FieldIssues, ValidationReport, Validator};
