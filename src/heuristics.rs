//! Naming-convention heuristics: which keys hold booleans, numbers or URLs,
//! and which namespace prefix a key belongs to.
//!
//! The built-in tables are plain constants. [`KeyHeuristics`] copies them
//! into owned sets so callers (and tests) can extend or replace them without
//! touching any global state.

use std::collections::BTreeSet;

use crate::settings::HeuristicSettings;

pub const BOOLEAN_KEY_PREFIXES: &[&str] = &["ENABLE_"];
pub const BOOLEAN_KEY_MARKERS: &[&str] = &["_FLAG"];
pub const BOOLEAN_KEYS: &[&str] = &[
    "DEBUG",
    "VERBOSE",
    "PRODUCTION",
    "MAINTENANCE_MODE",
    "USE_SSL",
    "SSL",
    "TLS",
    "DISABLE_SIGNUP",
];

pub const NUMERIC_KEY_MARKERS: &[&str] = &["_PORT", "_SIZE", "_COUNT", "_TIMEOUT", "_LIMIT"];
pub const NUMERIC_KEYS: &[&str] = &["PORT", "WORKERS", "MAX_CONNECTIONS", "TTL", "RETRIES"];

pub const URL_KEY_MARKERS: &[&str] = &["_URL", "_ENDPOINT", "BASE_URL"];
pub const URL_KEYS: &[&str] = &["URL", "ENDPOINT", "HOMEPAGE"];

/// Namespace prefixes recognised when grouping keys. Multi-word prefixes
/// use `_` between words, exactly as they appear in keys.
pub const KNOWN_PREFIXES: &[&str] = &[
    "APP",
    "AUTH",
    "AWS",
    "AWS_S3",
    "DATABASE",
    "DB",
    "EMAIL",
    "GITHUB",
    "GOOGLE",
    "GOOGLE_OAUTH",
    "MAIL",
    "NEXT_PUBLIC",
    "OAUTH",
    "OPENSEARCH",
    "POSTGRES",
    "REDIS",
    "S3",
    "SENTRY",
    "SMTP",
    "STRIPE",
];

/// Type inferred for a key from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Boolean,
    Numeric,
    Url,
    Plain,
}

/// Owned heuristic tables. Keys are compared upper-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyHeuristics {
    pub boolean_prefixes: Vec<String>,
    pub boolean_markers: Vec<String>,
    pub boolean_keys: BTreeSet<String>,
    pub numeric_markers: Vec<String>,
    pub numeric_keys: BTreeSet<String>,
    pub url_markers: Vec<String>,
    pub url_keys: BTreeSet<String>,
    pub prefixes: BTreeSet<String>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn owned_set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for KeyHeuristics {
    fn default() -> Self {
        Self {
            boolean_prefixes: owned(BOOLEAN_KEY_PREFIXES),
            boolean_markers: owned(BOOLEAN_KEY_MARKERS),
            boolean_keys: owned_set(BOOLEAN_KEYS),
            numeric_markers: owned(NUMERIC_KEY_MARKERS),
            numeric_keys: owned_set(NUMERIC_KEYS),
            url_markers: owned(URL_KEY_MARKERS),
            url_keys: owned_set(URL_KEYS),
            prefixes: owned_set(KNOWN_PREFIXES),
        }
    }
}

impl KeyHeuristics {
    /// Built-in tables plus whatever the settings add.
    pub fn from_settings(settings: &HeuristicSettings) -> Self {
        let mut heuristics = Self::default();
        let upper = |list: &Option<Vec<String>>| {
            list.iter()
                .flatten()
                .map(|s| s.trim().to_ascii_uppercase())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        };
        heuristics.boolean_keys.extend(upper(&settings.boolean_keys));
        heuristics.numeric_keys.extend(upper(&settings.numeric_keys));
        heuristics.url_keys.extend(upper(&settings.url_keys));
        heuristics.prefixes.extend(upper(&settings.prefixes));
        heuristics
    }

    /// Classify a key. Boolean conventions are checked first, then numeric,
    /// then URL.
    pub fn kind_of(&self, key: &str) -> KeyKind {
        let key = key.trim().to_ascii_uppercase();
        if self.boolean_keys.contains(&key)
            || self.boolean_prefixes.iter().any(|p| key.starts_with(p.as_str()))
            || self.boolean_markers.iter().any(|m| key.contains(m.as_str()))
        {
            return KeyKind::Boolean;
        }
        if self.numeric_keys.contains(&key)
            || self.numeric_markers.iter().any(|m| key.contains(m.as_str()))
        {
            return KeyKind::Numeric;
        }
        if self.url_keys.contains(&key) || self.url_markers.iter().any(|m| key.contains(m.as_str()))
        {
            return KeyKind::Url;
        }
        KeyKind::Plain
    }

    /// Namespace prefix of `key`, if any.
    ///
    /// Longest match wins: `AWS_S3_BUCKET` belongs to `AWS_S3`, not `AWS`,
    /// regardless of table order. A prefix only matches when the key
    /// continues past it with `_`, so a bare `DATABASE` key is ungrouped.
    pub fn prefix_of(&self, key: &str) -> Option<&str> {
        let upper = key.to_ascii_uppercase();
        self.prefixes
            .iter()
            .filter(|p| {
                upper.len() > p.len()
                    && upper.starts_with(p.as_str())
                    && upper.as_bytes()[p.len()] == b'_'
            })
            .max_by_key(|p| p.len())
            .map(String::as_str)
    }
}

/// Numeric keys that name a TCP/UDP port.
pub fn is_port_key(key: &str) -> bool {
    key.to_ascii_uppercase().ends_with("PORT")
}

/// Human-readable section title for a prefix: `NEXT_PUBLIC` -> `Next Public`.
pub fn title_case(prefix: &str) -> String {
    prefix
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let lower = word.to_ascii_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
