//! Engine settings: compiled defaults, an optional TOML layer, and
//! `PREFIX__KEY` environment variables, merged in that order.
//!
//! The layering mirrors how the engine is embedded: the host application
//! ships defaults, an operator may drop a TOML snippet next to it, and a
//! deployment can still override one knob through the environment.
//!
//! ```text
//! Compiled defaults     #[config(default = ...)]
//!        ↑ overridden by
//! TOML text             SettingsLoader::toml()
//!        ↑ overridden by
//! Environment vars      ENVFIG__DEBOUNCE_MS, ENVFIG__HEURISTICS__PREFIXES, ...
//! ```

use confique::Config;
use serde::{Deserialize, Serialize};
use toml::{Table, Value};

use crate::error::EnvfigError;

/// Sections whose every field is a list of strings.
const LIST_SECTIONS: &[&str] = &["heuristics"];

/// Tunables for conversion and validation.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Debounce window for per-field validation, in milliseconds.
    #[config(default = 200)]
    pub debounce_ms: u64,

    /// Values longer than this many characters produce a warning.
    #[config(default = 1000)]
    pub max_value_length: usize,

    /// Secret-looking keys with shorter values get a suggestion.
    #[config(default = 8)]
    pub min_secret_length: usize,

    /// Extra entries for the key-name heuristics.
    #[config(nested)]
    pub heuristics: HeuristicSettings,
}

/// Additions to the built-in heuristic tables.
#[derive(Config, Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct HeuristicSettings {
    /// Additional keys treated as booleans.
    pub boolean_keys: Option<Vec<String>>,

    /// Additional keys treated as numbers.
    pub numeric_keys: Option<Vec<String>>,

    /// Additional keys treated as URLs.
    pub url_keys: Option<Vec<String>>,

    /// Additional namespace prefixes used for grouping.
    pub prefixes: Option<Vec<String>>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 200,
            max_value_length: 1000,
            min_secret_length: 8,
            heuristics: HeuristicSettings::default(),
        }
    }
}

/// Builder that resolves [`EngineSettings`] from its layers.
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    toml: Option<String>,
    env_prefix: String,
    env_vars: Vec<(String, String)>,
    strict: bool,
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsLoader {
    pub fn new() -> Self {
        Self {
            toml: None,
            env_prefix: "ENVFIG".to_string(),
            env_vars: Vec::new(),
            strict: true,
        }
    }

    /// TOML text layered over the compiled defaults.
    pub fn toml(mut self, content: &str) -> Self {
        self.toml = Some(content.to_string());
        self
    }

    /// Override the environment prefix (default: `ENVFIG`).
    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    /// Environment variables to read. Pass `std::env::vars()` in production
    /// and synthetic pairs in tests.
    pub fn env_vars(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env_vars = vars.into_iter().collect();
        self
    }

    /// Reject unknown keys in the TOML layer (default: `true`).
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn load(self) -> Result<EngineSettings, EnvfigError> {
        let mut merged = Table::new();

        if let Some(content) = &self.toml {
            if self.strict {
                reject_unknown_keys(content)?;
            }
            merged = overlay(merged, toml::from_str(content)?);
        }

        merged = overlay(merged, env_table(&self.env_prefix, self.env_vars));

        let layer: <EngineSettings as Config>::Layer = Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| EnvfigError::InvalidSetting {
                key: "<merged>".into(),
                reason: e.to_string(),
            })?;

        Ok(EngineSettings::builder().preloaded(layer).load()?)
    }
}

/// Merge `top` into `base`; nested tables merge key by key, anything else is replaced.
fn overlay(mut base: Table, top: Table) -> Table {
    for (key, value) in top {
        let merged = match (base.remove(&key), value) {
            (Some(Value::Table(lower)), Value::Table(upper)) => Value::Table(overlay(lower, upper)),
            (_, value) => value,
        };
        base.insert(key, merged);
    }
    base
}

/// Build a table from `{PREFIX}__*` variables. `__` nests, segments are
/// lowercased, and values go through [`env_value`].
fn env_table(prefix: &str, vars: Vec<(String, String)>) -> Table {
    let needle = format!("{prefix}__");
    let mut table = Table::new();

    'vars: for (key, raw) in vars {
        let Some(rest) = key.strip_prefix(&needle).filter(|r| !r.is_empty()) else {
            continue;
        };
        let segments: Vec<String> = rest.split("__").map(str::to_lowercase).collect();
        let Some((leaf, parents)) = segments.split_last() else {
            continue;
        };

        let mut current = &mut table;
        for segment in parents {
            let entry = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Table(Table::new()));
            // A scalar already sits where a section is expected; skip the variable.
            let Value::Table(next) = entry else {
                continue 'vars;
            };
            current = next;
        }
        let value = match parents.first() {
            Some(section) if LIST_SECTIONS.contains(&section.as_str()) => env_list(&raw),
            _ => env_value(&raw),
        };
        current.insert(leaf.clone(), value);
    }

    table
}

/// bool, then integer, then comma-separated list, then string.
fn env_value(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("true") {
        return Value::Boolean(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Boolean(false);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Integer(i);
    }
    if raw.contains(',') {
        return env_list(raw);
    }
    Value::String(raw.to_string())
}

/// Comma-separated strings, even when there is only one item.
fn env_list(raw: &str) -> Value {
    Value::Array(
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .collect(),
    )
}

/// Strict mode: deserialize into the all-optional layer and collect every
/// key it does not consume.
fn reject_unknown_keys(content: &str) -> Result<(), EnvfigError> {
    let mut unknown: Vec<String> = Vec::new();
    let deserializer = toml::Deserializer::new(content);
    let _layer: <EngineSettings as Config>::Layer =
        serde_ignored::deserialize(deserializer, |path| unknown.push(path.to_string()))?;

    if unknown.is_empty() {
        return Ok(());
    }

    Err(EnvfigError::UnknownSettings(
        unknown
            .into_iter()
            .map(|key| {
                let line = find_key_line(content, &key);
                EnvfigError::UnknownSetting { key, line }
            })
            .collect(),
    ))
}

/// 1-based line of a dotted key in TOML text, tracking `[section]` headers.
/// Returns 0 when the key cannot be located.
fn find_key_line(content: &str, dotted_key: &str) -> usize {
    let (section, leaf) = match dotted_key.rsplit_once('.') {
        Some((section, leaf)) => (section, leaf),
        None => ("", dotted_key),
    };
    let mut current = String::new();

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if let Some(header) = trimmed.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
            current = header
                .split('.')
                .map(str::trim)
                .collect::<Vec<_>>()
                .join(".");
            continue;
        }
        if current == section
            && let Some(rest) = trimmed.strip_prefix(leaf)
            && rest.trim_start().starts_with('=')
        {
            return i + 1;
        }
    }
    0
}
