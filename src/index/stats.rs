//! Index statistics and operation metrics.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Running aggregate owned by a tree instance.
///
/// `max_key_encountered` is a high-water mark: it records the largest key
/// ever indexed and is not lowered by deletions or [`reset_rows`]
/// (`clear()` keeps it on purpose).
///
/// [`reset_rows`]: IndexStats::reset_rows
#[derive(Clone, Debug)]
pub struct IndexStats<K> {
    total_rows: u64,
    max_key_encountered: Option<K>,
}

impl<K> Default for IndexStats<K> {
    fn default() -> Self {
        Self {
            total_rows: 0,
            max_key_encountered: None,
        }
    }
}

impl<K: Clone> IndexStats<K> {
    /// Number of rows currently indexed.
    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    /// Largest key ever indexed, if any.
    pub fn max_key_encountered(&self) -> Option<&K> {
        self.max_key_encountered.as_ref()
    }

    pub(crate) fn add(&mut self, key: &K, rows: u64, is_new_max: bool) {
        self.total_rows += rows;
        if is_new_max {
            self.max_key_encountered = Some(key.clone());
        }
    }

    pub(crate) fn remove(&mut self, rows: u64) {
        self.total_rows = self.total_rows.saturating_sub(rows);
    }

    pub(crate) fn reset_rows(&mut self) {
        self.total_rows = 0;
    }
}

/// Snapshot of tree operation metrics at a point in time.
#[derive(Default, Debug, Clone, Copy)]
pub struct TreeMetricsSnapshot {
    /// Number of leaf node searches performed.
    pub leaf_searches: u64,
    /// Number of internal node searches performed.
    pub internal_searches: u64,
    /// Number of leaf node splits performed.
    pub leaf_splits: u64,
    /// Number of internal node splits performed.
    pub internal_splits: u64,
    /// Number of keys borrowed between leaf siblings.
    pub leaf_steals: u64,
    /// Number of children borrowed between internal siblings.
    pub internal_steals: u64,
    /// Number of leaf node merges performed.
    pub leaf_merges: u64,
    /// Number of internal node merges performed.
    pub internal_merges: u64,
}

/// Operation counters for a tree instance.
#[derive(Default, Debug)]
pub struct TreeMetrics {
    leaf_searches: AtomicU64,
    internal_searches: AtomicU64,
    leaf_splits: AtomicU64,
    internal_splits: AtomicU64,
    leaf_steals: AtomicU64,
    internal_steals: AtomicU64,
    leaf_merges: AtomicU64,
    internal_merges: AtomicU64,
}

impl TreeMetrics {
    /// Returns the current count of leaf node searches.
    pub fn leaf_searches(&self) -> u64 {
        self.leaf_searches.load(AtomicOrdering::Relaxed)
    }

    /// Returns the current count of internal node searches.
    pub fn internal_searches(&self) -> u64 {
        self.internal_searches.load(AtomicOrdering::Relaxed)
    }

    /// Returns the current count of leaf node splits.
    pub fn leaf_splits(&self) -> u64 {
        self.leaf_splits.load(AtomicOrdering::Relaxed)
    }

    /// Returns the current count of internal node splits.
    pub fn internal_splits(&self) -> u64 {
        self.internal_splits.load(AtomicOrdering::Relaxed)
    }

    /// Returns the current count of leaf steals.
    pub fn leaf_steals(&self) -> u64 {
        self.leaf_steals.load(AtomicOrdering::Relaxed)
    }

    /// Returns the current count of internal steals.
    pub fn internal_steals(&self) -> u64 {
        self.internal_steals.load(AtomicOrdering::Relaxed)
    }

    /// Returns the current count of leaf merges.
    pub fn leaf_merges(&self) -> u64 {
        self.leaf_merges.load(AtomicOrdering::Relaxed)
    }

    /// Returns the current count of internal merges.
    pub fn internal_merges(&self) -> u64 {
        self.internal_merges.load(AtomicOrdering::Relaxed)
    }

    pub(crate) fn inc_leaf_searches(&self) {
        self.leaf_searches.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_internal_searches(&self) {
        self.internal_searches.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_leaf_splits(&self) {
        self.leaf_splits.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_internal_splits(&self) {
        self.internal_splits.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_leaf_steals(&self) {
        self.leaf_steals.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_internal_steals(&self) {
        self.internal_steals.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_leaf_merges(&self) {
        self.leaf_merges.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub(crate) fn inc_internal_merges(&self) {
        self.internal_merges.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Creates a snapshot of all current counters.
    pub fn snapshot(&self) -> TreeMetricsSnapshot {
        TreeMetricsSnapshot {
            leaf_searches: self.leaf_searches(),
            internal_searches: self.internal_searches(),
            leaf_splits: self.leaf_splits(),
            internal_splits: self.internal_splits(),
            leaf_steals: self.leaf_steals(),
            internal_steals: self.internal_steals(),
            leaf_merges: self.leaf_merges(),
            internal_merges: self.internal_merges(),
        }
    }

    /// Emits current counters to the tracing infrastructure.
    pub fn emit_tracing(&self) {
        let snapshot = self.snapshot();
        tracing::info!(
            target: "umber_btree::stats",
            leaf_searches = snapshot.leaf_searches,
            internal_searches = snapshot.internal_searches,
            leaf_splits = snapshot.leaf_splits,
            internal_splits = snapshot.internal_splits,
            leaf_steals = snapshot.leaf_steals,
            internal_steals = snapshot.internal_steals,
            leaf_merges = snapshot.leaf_merges,
            internal_merges = snapshot.internal_merges,
            "tree metrics snapshot"
        );
    }
}
