//! Structured document to env text.
//!
//! Two layouts:
//!
//! - **Flat** (default): one `KEY=value` per line. With prior text the
//!   source order, blank lines and floating comment blocks are kept; keys
//!   new to the document are appended in sorted order. Without prior text
//!   keys come out sorted.
//! - **Grouped**: keys are bucketed by namespace prefix (see
//!   [`KeyHeuristics::prefix_of`]). Ungrouped keys come first, then one
//!   block per prefix, optionally with a `# Title Configuration` header.
//!
//! In both layouts a comment that sat directly above a key in the prior
//! text is written directly above that key again, wherever it lands.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;

use crate::error::EnvfigError;
use crate::heuristics::{KeyHeuristics, title_case};
use crate::normalize::quote;
use crate::parser::{self, Line};
use crate::types::{FormatOptions, StructuredDocument};

/// Shape of the prior text, minus the values.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Layout {
    Blank,
    /// Comment lines not attached to any key.
    Floating(Vec<String>),
    Entry(String),
}

/// Prior text digested into a layout plus the comment attached to each key.
#[derive(Debug, Default)]
struct Prior {
    layout: Vec<Layout>,
    comments: BTreeMap<String, String>,
}

impl Prior {
    fn read(text: &str) -> Self {
        let mut prior = Prior::default();
        let mut pending: Vec<String> = Vec::new();

        // The final newline terminates the last line; it is not a blank line.
        for line in parser::scan(text.strip_suffix('\n').unwrap_or(text)) {
            match line {
                Line::Comment(comment) => pending.push(comment.to_string()),
                Line::Entry { key, .. } => {
                    if !pending.is_empty() {
                        prior
                            .comments
                            .insert(key.to_string(), std::mem::take(&mut pending).join("\n"));
                    }
                    prior.layout.push(Layout::Entry(key.to_string()));
                }
                Line::Blank | Line::Invalid(_) => {
                    if !pending.is_empty() {
                        prior.layout.push(Layout::Floating(std::mem::take(&mut pending)));
                    }
                    if matches!(line, Line::Blank) {
                        prior.layout.push(Layout::Blank);
                    }
                }
            }
        }
        if !pending.is_empty() {
            prior.layout.push(Layout::Floating(pending));
        }
        prior
    }

    /// Keys in source order, first occurrence only.
    fn key_order(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.layout
            .iter()
            .filter_map(|item| match item {
                Layout::Entry(key) if seen.insert(key.as_str()) => Some(key.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Line writer that never emits leading or doubled blank lines.
struct Emitter {
    out: String,
    at_start: bool,
    last_blank: bool,
}

impl Emitter {
    fn new() -> Self {
        Self {
            out: String::new(),
            at_start: true,
            last_blank: false,
        }
    }

    fn line(&mut self, text: &str) -> std::fmt::Result {
        writeln!(self.out, "{text}")?;
        self.at_start = false;
        self.last_blank = false;
        Ok(())
    }

    fn blank(&mut self) -> std::fmt::Result {
        if self.at_start || self.last_blank {
            return Ok(());
        }
        writeln!(self.out)?;
        self.last_blank = true;
        Ok(())
    }

    fn comment(&mut self, comment: &str) -> std::fmt::Result {
        for line in comment.split('\n') {
            if line.is_empty() {
                self.line("#")?;
            } else {
                self.line(&format!("# {line}"))?;
            }
        }
        Ok(())
    }

    fn entry(&mut self, key: &str, value: &str, comment: Option<&String>) -> std::fmt::Result {
        if let Some(comment) = comment {
            self.comment(comment)?;
        }
        self.line(&format!("{key}={}", quote(value)))
    }

    fn finish(mut self) -> String {
        if self.last_blank {
            self.out.pop();
        }
        self.out
    }
}

/// Emits env text from a structured document.
#[derive(Debug, Clone, Default)]
pub struct Generator {
    heuristics: KeyHeuristics,
}

impl Generator {
    pub fn new(heuristics: KeyHeuristics) -> Self {
        Self { heuristics }
    }

    /// Render `doc` as env text. Output is a pure function of the arguments.
    pub fn generate(
        &self,
        doc: &StructuredDocument,
        prior_text: Option<&str>,
        options: &FormatOptions,
    ) -> Result<String, EnvfigError> {
        let prior = prior_text.map(Prior::read).unwrap_or_default();
        let mut emitter = Emitter::new();

        if options.group_by_prefix {
            self.write_grouped(&mut emitter, doc, &prior, options)?;
        } else if prior_text.is_some() {
            write_in_source_order(&mut emitter, doc, &prior, options)?;
        } else {
            for (key, value) in doc {
                emitter.entry(key, value, None)?;
            }
        }

        Ok(emitter.finish())
    }

    fn write_grouped(
        &self,
        emitter: &mut Emitter,
        doc: &StructuredDocument,
        prior: &Prior,
        options: &FormatOptions,
    ) -> std::fmt::Result {
        let mut ungrouped: Vec<&str> = Vec::new();
        let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();

        for key in ordered_keys(doc, prior) {
            match self.heuristics.prefix_of(key) {
                Some(prefix) => match groups.iter_mut().find(|(p, _)| *p == prefix) {
                    Some((_, keys)) => keys.push(key),
                    None => groups.push((prefix, vec![key])),
                },
                None => ungrouped.push(key),
            }
        }

        if options.sort_within_groups {
            ungrouped.sort_unstable();
            groups.sort_by(|a, b| a.0.cmp(b.0));
            for (_, keys) in &mut groups {
                keys.sort_unstable();
            }
        }

        for key in ungrouped {
            emitter.entry(key, &doc[key], prior.comments.get(key))?;
        }
        for (prefix, keys) in groups {
            emitter.blank()?;
            if options.add_section_headers {
                emitter.line(&format!("# {} Configuration", title_case(prefix)))?;
            }
            for key in keys {
                emitter.entry(key, &doc[key], prior.comments.get(key))?;
            }
        }
        Ok(())
    }
}

/// Keys of `doc` in prior-text order, then the remaining keys sorted.
fn ordered_keys<'a>(doc: &'a StructuredDocument, prior: &Prior) -> Vec<&'a str> {
    let mut keys: Vec<&'a str> = Vec::with_capacity(doc.len());
    let mut placed = HashSet::new();
    for key in prior.key_order() {
        if let Some((doc_key, _)) = doc.get_key_value(key) {
            keys.push(doc_key.as_str());
            placed.insert(doc_key.as_str());
        }
    }
    keys.extend(doc.keys().map(String::as_str).filter(|k| !placed.contains(k)));
    keys
}

fn write_in_source_order(
    emitter: &mut Emitter,
    doc: &StructuredDocument,
    prior: &Prior,
    options: &FormatOptions,
) -> std::fmt::Result {
    let mut written: HashSet<&str> = HashSet::new();
    // A floating block must stay separated from the next entry, or a re-read
    // attaches it to that entry.
    let mut after_floating = false;

    for item in &prior.layout {
        match item {
            Layout::Blank if options.preserve_empty_lines => emitter.blank()?,
            Layout::Blank => {}
            Layout::Floating(lines) => {
                emitter.comment(&lines.join("\n"))?;
                after_floating = true;
            }
            Layout::Entry(key) => {
                if let Some((doc_key, value)) = doc.get_key_value(key.as_str())
                    && written.insert(doc_key.as_str())
                {
                    if after_floating {
                        emitter.blank()?;
                        after_floating = false;
                    }
                    emitter.entry(doc_key, value, prior.comments.get(doc_key))?;
                }
            }
        }
    }

    for (key, value) in doc {
        if !written.contains(key.as_str()) {
            if after_floating {
                emitter.blank()?;
                after_floating = false;
            }
            emitter.entry(key, value, None)?;
        }
    }
    Ok(())
}
