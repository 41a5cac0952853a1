//! Rewrite accounting.

use std::collections::HashMap;

/// Per-rule, per-graph counters: embeddings found by the matcher and
/// rewrites actually applied.
#[derive(Debug, Clone, Default)]
pub struct MatchStats {
    found: HashMap<(String, String), usize>,
    applied: HashMap<(String, String), usize>,
}

impl MatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_found(&mut self, rule: &str, graph: &str, count: usize) {
        *self.found.entry((rule.to_owned(), graph.to_owned())).or_default() += count;
    }

    pub fn record_applied(&mut self, rule: &str, graph: &str) {
        *self.applied.entry((rule.to_owned(), graph.to_owned())).or_default() += 1;
    }

    /// Matches found for one rule on one graph, across all rounds.
    pub fn found(&self, rule: &str, graph: &str) -> usize {
        self.found.get(&(rule.to_owned(), graph.to_owned())).copied().unwrap_or(0)
    }

    /// Applied count for one rule on one graph.
    pub fn applied(&self, rule: &str, graph: &str) -> usize {
        self.applied.get(&(rule.to_owned(), graph.to_owned())).copied().unwrap_or(0)
    }

    /// Total applied rewrites across all rules and graphs.
    pub fn total_applied(&self) -> usize {
        self.applied.values().sum()
    }

    pub fn iter_applied(&self) -> impl Iterator<Item = (&str, &str, usize)> {
        self.applied.iter().map(|((r, g), c)| (r.as_str(), g.as_str(), *c))
    }
}
