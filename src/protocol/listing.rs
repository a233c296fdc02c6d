//! Parsing of `/ls` output into [`FileEntry`] values.
//!
//! Firmware versions print listings in one of two layouts:
//!
//! ```text
//! FILE     1024 B    notes.txt        (tabular)
//! DIR                scripts
//! [FILE] photo.png (2048 bytes)       (bracketed)
//! [DIR] assets
//! ```
//!
//! Each layout is a [`ListingGrammar`]. Grammars are tried in order and the
//! first one that yields an entry wins; lines no grammar accepts are dropped.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{EntryKind, FileEntry};

static TABULAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(DIR|FILE)\s+(?:(\d+(?:\.\d+)?)\s*([BKMG]+)\s+)?(.+)$")
        .expect("tabular listing pattern is valid")
});

static BRACKETED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[(FILE|DIR)\]\s+(.+?)(?:\s+\((\d+)\s*bytes?\))?$")
        .expect("bracketed listing pattern is valid")
});

/// A single listing line layout.
pub trait ListingGrammar: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Parses one line, returning `None` if the line does not match or is noise.
    fn parse(&self, line: &str) -> Option<FileEntry>;
}

/// `TYPE [SIZE UNIT] NAME`, e.g. `FILE 2.5 MB video.bin`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TabularGrammar;

impl ListingGrammar for TabularGrammar {
    fn name(&self) -> &'static str {
        "tabular"
    }

    fn parse(&self, line: &str) -> Option<FileEntry> {
        let caps = TABULAR.captures(line)?;
        let kind = EntryKind::from_label(&caps[1])?;
        let name = caps[4].trim();
        if name.is_empty() {
            return None;
        }

        let size = caps
            .get(2)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0);
        let unit = caps.get(3).map_or("B", |m| m.as_str());

        Some(FileEntry::new(kind, name, to_bytes(size, unit)))
    }
}

/// `[TYPE] NAME (N bytes)`, with the byte count optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct BracketedGrammar;

impl ListingGrammar for BracketedGrammar {
    fn name(&self) -> &'static str {
        "bracketed"
    }

    fn parse(&self, line: &str) -> Option<FileEntry> {
        let caps = BRACKETED.captures(line)?;
        let kind = EntryKind::from_label(&caps[1])?;
        let name = caps[2].trim();
        // Headers such as "[DIR] === listing ===" share the layout.
        if name.is_empty() || name.contains("listing") || name.contains("===") {
            return None;
        }

        let size = caps
            .get(3)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0);

        Some(FileEntry::new(kind, name, size))
    }
}

/// Converts a size with a unit (`B`, `KB`, `M`, `GB`, ...) to whole bytes.
///
/// Only the first letter of the unit is significant.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn to_bytes(size: f64, unit: &str) -> u64 {
    let multiplier = match unit.chars().next().map(|c| c.to_ascii_uppercase()) {
        Some('K') => 1024.0,
        Some('M') => 1024.0 * 1024.0,
        Some('G') => 1024.0 * 1024.0 * 1024.0,
        _ => 1.0,
    };
    (size * multiplier).round().max(0.0) as u64
}

/// Ordered set of listing grammars.
pub struct ListingParser {
    grammars: Vec<Box<dyn ListingGrammar>>,
}

impl Default for ListingParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingParser {
    /// Creates a parser with the tabular and bracketed grammars, in that order.
    #[must_use]
    pub fn new() -> Self {
        Self {
            grammars: vec![Box::new(TabularGrammar), Box::new(BracketedGrammar)],
        }
    }

    /// Appends a grammar, tried after the existing ones.
    #[must_use]
    pub fn with_grammar(mut self, grammar: impl ListingGrammar + 'static) -> Self {
        self.grammars.push(Box::new(grammar));
        self
    }

    /// Parses one line with the first grammar that accepts it.
    #[must_use]
    pub fn parse_line(&self, line: &str) -> Option<FileEntry> {
        self.grammars.iter().find_map(|grammar| {
            let entry = grammar.parse(line)?;
            tracing::trace!("{} grammar matched {:?}", grammar.name(), entry.name);
            Some(entry)
        })
    }

    /// Parses collected lines, keeping their order and dropping the rest.
    #[must_use]
    pub fn parse<S: AsRef<str>>(&self, lines: &[S]) -> Vec<FileEntry> {
        lines
            .iter()
            .filter_map(|line| self.parse_line(line.as_ref()))
            .collect()
    }
}

/// Parses listing lines with the default grammars.
#[must_use]
pub fn parse_listing<S: AsRef<str>>(lines: &[S]) -> Vec<FileEntry> {
    ListingParser::new().parse(lines)
}

/// Returns true if any default grammar accepts the line.
#[must_use]
pub fn is_entry_line(line: &str) -> bool {
    TabularGrammar.parse(line).is_some() || BracketedGrammar.parse(line).is_some()
}
