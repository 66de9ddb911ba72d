//! Raw-content stash.
//!
//! Content that is already final (raw HTML, escaped characters, entities) is
//! swapped for an opaque marker while the tree is built and rewritten, then
//! swapped back by the `unstash` postprocessor. Markers are wrapped in STX/ETX
//! control characters, which the whitespace preprocessor strips from the source,
//! so authored text can never forge one.

use std::sync::LazyLock;

use regex::Regex;

/// Opens every marker.
pub const MARKER_START: char = '\u{2}';
/// Closes every marker.
pub const MARKER_END: char = '\u{3}';

/// Stands in for `&` in obfuscated output until the `amp_substitute` postprocessor runs.
pub const AMP_PLACEHOLDER: &str = "\u{2}amp\u{3}";

/// Matches a marker, capturing its index.
pub(crate) static MARKER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x02raw:(\d+)\x03").expect("invalid marker regex"));

/// One protected span.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StashEntry {
    raw: String,
    block: bool,
}

/// Counters describing one conversion's stash usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StashStats {
    /// Markers issued.
    pub stored: usize,
    /// Marker lookups performed while unstashing.
    pub retrieved: usize,
}

/// Per-conversion store of protected content.
#[derive(Debug, Default)]
pub struct Stash {
    entries: Vec<StashEntry>,
    retrieved: usize,
}

impl Stash {
    /// Create an empty stash.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Protect inline content and return its marker.
    pub fn store(&mut self, raw: impl Into<String>) -> String {
        self.push(raw.into(), false)
    }

    /// Protect a block of content and return its marker.
    ///
    /// When the marker ends up as the only content of a paragraph, unstashing
    /// replaces the whole paragraph rather than just the marker.
    pub fn store_block(&mut self, raw: impl Into<String>) -> String {
        self.push(raw.into(), true)
    }

    /// Content behind `marker`, counting the lookup.
    pub fn retrieve(&mut self, marker: &str) -> Option<&str> {
        let index = parse_marker(marker)?;
        self.retrieve_index(index).map(|(raw, _)| raw)
    }

    /// Content and block flag for entry `index`, counting the lookup.
    pub(crate) fn retrieve_index(&mut self, index: usize) -> Option<(&str, bool)> {
        let entry = self.entries.get(index)?;
        self.retrieved += 1;
        Some((entry.raw.as_str(), entry.block))
    }

    /// Drop all entries and counters.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.retrieved = 0;
    }

    /// Number of markers issued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no marker has been issued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Usage counters.
    #[must_use]
    pub fn stats(&self) -> StashStats {
        StashStats {
            stored: self.entries.len(),
            retrieved: self.retrieved,
        }
    }

    fn push(&mut self, raw: String, block: bool) -> String {
        let marker = marker_for(self.entries.len());
        self.entries.push(StashEntry { raw, block });
        marker
    }
}

/// Marker text for entry `index`.
#[must_use]
pub fn marker_for(index: usize) -> String {
    format!("{MARKER_START}raw:{index}{MARKER_END}")
}

/// Entry index encoded in `marker`, if it is exactly one marker.
#[must_use]
pub fn parse_marker(marker: &str) -> Option<usize> {
    marker
        .strip_prefix(MARKER_START)?
        .strip_prefix("raw:")?
        .strip_suffix(MARKER_END)?
        .parse()
        .ok()
}

/// Whether `text` contains any stash marker.
#[must_use]
pub fn contains_marker(text: &str) -> bool {
    MARKER_PATTERN.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers_are_distinct_and_increasing() {
        let mut stash = Stash::new();
        let first = stash.store("<b>");
        let second = stash.store("<b>");
        assert_ne!(first, second);
        assert_eq!(parse_marker(&first), Some(0));
        assert_eq!(parse_marker(&second), Some(1));
    }

    #[test]
    fn test_marker_uses_control_characters() {
        let marker = marker_for(7);
        assert!(marker.starts_with('\u{2}'));
        assert!(marker.ends_with('\u{3}'));
        assert!(contains_marker(&format!("a{marker}b")));
        assert!(!contains_marker("raw:7"));
    }

    #[test]
    fn test_retrieve_counts_lookups() {
        let mut stash = Stash::new();
        let marker = stash.store("&amp;");
        assert_eq!(stash.retrieve(&marker), Some("&amp;"));
        assert_eq!(
            stash.stats(),
            StashStats {
                stored: 1,
                retrieved: 1
            }
        );
    }

    #[test]
    fn test_retrieve_unknown_marker() {
        let mut stash = Stash::new();
        assert_eq!(stash.retrieve(&marker_for(3)), None);
        assert_eq!(stash.retrieve("plain"), None);
        assert_eq!(stash.stats().retrieved, 0);
    }

    #[test]
    fn test_block_flag() {
        let mut stash = Stash::new();
        stash.store("a");
        stash.store_block("<div></div>");
        assert_eq!(stash.retrieve_index(0), Some(("a", false)));
        assert_eq!(stash.retrieve_index(1), Some(("<div></div>", true)));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut stash = Stash::new();
        let marker = stash.store("x");
        stash.retrieve(&marker);
        stash.reset();
        assert!(stash.is_empty());
        assert_eq!(stash.stats(), StashStats::default());
        assert_eq!(stash.store("y"), marker_for(0));
    }
}
