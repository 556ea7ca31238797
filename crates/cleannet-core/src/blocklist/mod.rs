//! Block-list management
//!
//! The [`WildcardTrie`] answers "is this domain blocked?"; the [`Blocklist`]
//! wraps it in an atomically-swappable handle so the engine's workers can
//! keep matching while an update builds a replacement off to the side.

mod trie;

pub use trie::WildcardTrie;

use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Shared, swap-on-update block-list matcher.
///
/// Readers take a cheap snapshot of the current trie; updates construct a
/// fresh trie and publish it in one swap, so no reader ever observes a
/// partially-inserted pattern.
#[derive(Debug, Default)]
pub struct Blocklist {
    trie: RwLock<Arc<WildcardTrie>>,
}

impl Blocklist {
    /// Create an empty block list
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a block list from an initial set of patterns
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let list = Self::new();
        list.update(patterns);
        list
    }

    /// Check whether a domain matches any pattern
    pub fn matches(&self, domain: &str) -> bool {
        self.snapshot().matches(domain)
    }

    /// Get the current trie snapshot
    pub fn snapshot(&self) -> Arc<WildcardTrie> {
        self.trie.read().clone()
    }

    /// Replace the entire pattern set.
    ///
    /// The new trie is built before the swap; concurrent readers keep using
    /// the previous snapshot until it completes.
    pub fn update<I, S>(&self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut trie = WildcardTrie::new();
        for pattern in patterns {
            trie.insert(pattern.as_ref());
        }
        let count = trie.len();
        *self.trie.write() = Arc::new(trie);
        info!("Block list updated, {} patterns active", count);
    }

    /// Load patterns from a file, replacing the current set.
    ///
    /// One pattern per line; empty lines and lines starting with `#` are
    /// ignored. Returns the number of patterns loaded.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> std::io::Result<usize> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let patterns = parse_patterns(&content);
        let count = patterns.len();

        self.update(patterns);
        info!("Loaded {} patterns from {}", count, path.display());
        Ok(count)
    }

    /// Number of patterns in the current snapshot
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Check if the current snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

/// Extract patterns from block-list file content.
fn parse_patterns(content: &str) -> Vec<&str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_update_replaces_patterns() {
        let list = Blocklist::from_patterns(["old.example.com"]);
        assert!(list.matches("old.example.com"));

        list.update(["new.example.com"]);
        assert!(!list.matches("old.example.com"));
        assert!(list.matches("new.example.com"));
    }

    #[test]
    fn test_snapshot_survives_update() {
        let list = Blocklist::from_patterns(["stable.test"]);
        let snapshot = list.snapshot();

        list.update(Vec::<String>::new());

        // The old snapshot is unaffected by the swap
        assert!(snapshot.matches("stable.test"));
        assert!(!list.matches("stable.test"));
    }

    #[test]
    fn test_parse_patterns_skips_comments() {
        let content = "# comment\n\nexample.com\n  *.ads.net  \n# another\n";
        let patterns = parse_patterns(content);
        assert_eq!(patterns, vec!["example.com", "*.ads.net"]);
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# blocked domains").unwrap();
        writeln!(file, "ads.example.com").unwrap();
        writeln!(file, "*.tracker.net").unwrap();
        file.flush().unwrap();

        let list = Blocklist::new();
        let count = list.load_file(file.path()).unwrap();

        assert_eq!(count, 2);
        assert!(list.matches("ads.example.com"));
        assert!(list.matches("deep.tracker.net"));
        assert!(!list.matches("example.org"));
    }

    #[test]
    fn test_load_missing_file() {
        let list = Blocklist::new();
        assert!(list.load_file("/nonexistent/blocklist.txt").is_err());
    }
}
