//! Crawl-wide dedupe and per-site counters.

use crate::config::Platform;
use std::collections::{BTreeMap, HashSet};

/// State one crawl accumulates. Pass the same context to several crawls to
/// dedupe across them, or [`merge`](ScoutContext::merge) contexts afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoutContext {
    seen: HashSet<String>,
    counts: BTreeMap<Platform, usize>,
}

impl ScoutContext {
    /// Empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a canonical URL for `platform` unless it was seen already or
    /// the site reached `cap`. Returns whether the listing was admitted.
    pub fn admit(&mut self, platform: Platform, canonical_url: &str, cap: usize) -> bool {
        if self.is_full(platform, cap) || !self.seen.insert(canonical_url.to_string()) {
            return false;
        }
        *self.counts.entry(platform).or_default() += 1;
        true
    }

    /// Whether `platform` already holds `cap` listings.
    pub fn is_full(&self, platform: Platform, cap: usize) -> bool {
        self.count(platform) >= cap
    }

    /// Whether a canonical URL was admitted before.
    pub fn has_seen(&self, canonical_url: &str) -> bool {
        self.seen.contains(canonical_url)
    }

    /// Listings admitted for one site.
    pub fn count(&self, platform: Platform) -> usize {
        self.counts.get(&platform).copied().unwrap_or(0)
    }

    /// Listings admitted across sites.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Per-site counts.
    pub fn counts(&self) -> &BTreeMap<Platform, usize> {
        &self.counts
    }

    /// Fold another crawl's state into this one.
    pub fn merge(&mut self, other: ScoutContext) {
        self.seen.extend(other.seen);
        for (platform, count) in other.counts {
            *self.counts.entry(platform).or_default() += count;
        }
    }
}
