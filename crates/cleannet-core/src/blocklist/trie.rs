//! Label-reversed wildcard trie
//!
//! Patterns and domains are split on `.` and walked from the top-level
//! label down, so `*.ads.example.com` is stored as com → example → ads
//! with the wildcard flag on the `ads` node. Wildcard nodes never have
//! children; the wildcard swallows everything beneath it.

use std::collections::HashMap;

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<String, TrieNode>,
    /// A `*` label ended a pattern here: this label and everything below it
    /// is blocked, including the base domain itself.
    wildcard: bool,
    /// An exact (non-wildcard) pattern ends here. Distinguishes an inserted
    /// domain from an intermediate node created for a longer pattern.
    terminal: bool,
}

/// A trie of blocked domain patterns supporting `*` wildcards.
///
/// Build-once, read-many: construct and fill the trie, then share it
/// immutably. Swapping in updates is [`Blocklist`]'s job.
///
/// [`Blocklist`]: super::Blocklist
#[derive(Debug, Default)]
pub struct WildcardTrie {
    root: TrieNode,
    len: usize,
}

impl WildcardTrie {
    /// Create an empty trie
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a domain pattern, e.g. `ads.example.com` or `*.example.com`.
    ///
    /// Labels are lower-cased. A `*` label marks the node wildcard-terminal
    /// and ends the descent; anything after it in the pattern is ignored.
    /// Inserting the same pattern twice is a no-op.
    pub fn insert(&mut self, pattern: &str) {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return;
        }

        let pattern = pattern.to_lowercase();
        let mut current = &mut self.root;

        for label in pattern.split('.').rev() {
            if label == "*" {
                if !current.wildcard {
                    current.wildcard = true;
                    self.len += 1;
                }
                return;
            }
            current = current.children.entry(label.to_string()).or_default();
        }

        if !current.terminal {
            current.terminal = true;
            self.len += 1;
        }
    }

    /// Check whether a domain matches any inserted pattern.
    pub fn matches(&self, domain: &str) -> bool {
        let domain = domain.trim();
        if domain.is_empty() {
            return false;
        }

        let domain = domain.to_lowercase();
        let mut current = &self.root;

        for label in domain.split('.').rev() {
            if current.wildcard {
                return true;
            }
            match current.children.get(label) {
                Some(child) => current = child,
                None => return false,
            }
        }

        current.wildcard || current.terminal
    }

    /// Number of distinct patterns inserted
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the trie holds no patterns
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
