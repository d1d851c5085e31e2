use std::fmt;

use crate::error::{IndexError, Result};
use crate::index::comparator::{Comparator, Favor};
use crate::index::key::RowId;
use crate::index::stats::{IndexStats, TreeMetrics};
use crate::index::Index;

use super::codecs::IndexRow;
use super::types::{BTree, BTreeOptions, NodeArena, NodeId, DEFAULT_ORDER, MIN_ORDER};

impl<C: Comparator> BTree<C> {
    /// Creates an empty tree with the default order.
    pub fn new(name: impl Into<String>, cmp: C, unique: bool) -> Self {
        Self::build(name.into(), cmp, unique, DEFAULT_ORDER)
    }

    /// Creates an empty tree with explicit options.
    pub fn with_options(
        name: impl Into<String>,
        cmp: C,
        unique: bool,
        options: BTreeOptions,
    ) -> Result<Self> {
        if options.order < MIN_ORDER {
            return Err(IndexError::Invalid("tree order must be at least 4"));
        }
        Ok(Self::build(name.into(), cmp, unique, options.order))
    }

    fn build(name: String, cmp: C, unique: bool, order: usize) -> Self {
        let multi_dim = cmp.key_dimensions() > 1;
        let mut arena = NodeArena::new();
        let root = arena.alloc(0);
        Self {
            name,
            cmp,
            unique,
            order,
            max_keys: order - 1,
            min_keys: order >> 1,
            multi_dim,
            root,
            arena,
            stats: IndexStats::default(),
            metrics: TreeMetrics::default(),
        }
    }

    /// Index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether each key maps to exactly one row id.
    pub fn is_unique_key(&self) -> bool {
        self.unique
    }

    /// The comparator this tree orders keys with.
    pub fn comparator(&self) -> &C {
        &self.cmp
    }

    /// Running row count and max-key watermark.
    pub fn stats(&self) -> &IndexStats<C::Key> {
        &self.stats
    }

    /// Operation counters for this tree.
    pub fn metrics(&self) -> &TreeMetrics {
        &self.metrics
    }

    /// Maximum fan-out this tree was built with.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Inserts `row` under `key`.
    ///
    /// Fails with [`IndexError::DuplicateKey`] when a unique tree already
    /// contains the key, and with [`IndexError::DuplicateValue`] when a
    /// non-unique tree already holds that row id for the key.
    pub fn add(&mut self, key: &C::Key, row: RowId) -> Result<()> {
        let root = self.insert_at(self.root, key, row, false)?;
        self.reseat_root(root);
        Ok(())
    }

    /// Upsert: replaces the value set of an existing key, inserts otherwise.
    pub fn set(&mut self, key: &C::Key, row: RowId) -> Result<()> {
        let root = self.insert_at(self.root, key, row, true)?;
        self.reseat_root(root);
        Ok(())
    }

    /// Removes `key`, or just one of its row ids.
    ///
    /// With `row` supplied on a non-unique tree only that id is removed and
    /// the key entry survives while other ids remain. Absent keys are a
    /// no-op.
    pub fn remove(&mut self, key: &C::Key, row: Option<RowId>) {
        self.delete_at(self.root, key, row);
        let root = self.arena.node(self.root);
        if !root.is_leaf() && root.children.len() == 1 {
            let child = root.children[0];
            let old = self.root;
            self.arena.node_mut(child).parent = None;
            self.root = child;
            self.arena.release(old);
            tracing::debug!(
                target: "umber_btree::maintenance",
                node = self.arena.node(child).id,
                "root unwrapped to single child"
            );
        }
    }

    /// Row ids stored under `key`; empty when absent. Unique trees return a
    /// single-element list.
    pub fn get(&self, key: &C::Key) -> Vec<RowId> {
        let (leaf, pos) = self.locate(key);
        match pos {
            Some(pos) => self.arena.node(leaf).values[pos].to_vec(),
            None => Vec::new(),
        }
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &C::Key) -> bool {
        let (_, pos) = self.locate(key);
        pos.is_some()
    }

    /// Exact-match descent to the leaf owning `key`, with the matching slot
    /// when the key exists.
    fn locate(&self, key: &C::Key) -> (NodeId, Option<usize>) {
        tracing::trace!(target: "umber_btree::search", name = %self.name, key = ?key, "descending for key");
        let mut cur = self.root;
        loop {
            let node = self.arena.node(cur);
            let pos = self.search_key(&node.keys, key);
            let exact =
                pos < node.keys.len() && matches!(self.cmp.compare(&node.keys[pos], key), Favor::Tie);
            if node.is_leaf() {
                self.metrics.inc_leaf_searches();
                return (cur, exact.then_some(pos));
            }
            self.metrics.inc_internal_searches();
            // An exact separator match means the key is the leftmost key of
            // the right subtree.
            cur = node.children[if exact { pos + 1 } else { pos }];
        }
    }

    /// Smallest key whose first dimension is non-null, with its row ids.
    pub fn min(&self) -> Option<(C::Key, Vec<RowId>)> {
        let forward = self.first_comparable_forward();
        let backward = self.first_comparable_backward();
        match (forward, backward) {
            (Some(f), Some(b)) => {
                if matches!(self.cmp.min(&f.0, &b.0), Favor::Rhs) {
                    Some(b)
                } else {
                    Some(f)
                }
            }
            (found, None) | (None, found) => found,
        }
    }

    /// Largest key whose first dimension is non-null, with its row ids.
    pub fn max(&self) -> Option<(C::Key, Vec<RowId>)> {
        let forward = self.first_comparable_forward();
        let backward = self.first_comparable_backward();
        match (forward, backward) {
            (Some(f), Some(b)) => {
                if matches!(self.cmp.max(&f.0, &b.0), Favor::Rhs) {
                    Some(b)
                } else {
                    Some(f)
                }
            }
            (found, None) | (None, found) => found,
        }
    }

    fn first_comparable_forward(&self) -> Option<(C::Key, Vec<RowId>)> {
        let mut cur = Some(self.leftmost_leaf());
        while let Some(id) = cur {
            let node = self.arena.node(id);
            for (i, key) in node.keys.iter().enumerate() {
                if self.cmp.is_comparable(key) {
                    return Some((key.clone(), node.values[i].to_vec()));
                }
            }
            cur = node.next;
        }
        None
    }

    fn first_comparable_backward(&self) -> Option<(C::Key, Vec<RowId>)> {
        let mut cur = Some(self.rightmost_leaf());
        while let Some(id) = cur {
            let node = self.arena.node(id);
            for (i, key) in node.keys.iter().enumerate().rev() {
                if self.cmp.is_comparable(key) {
                    return Some((key.clone(), node.values[i].to_vec()));
                }
            }
            cur = node.prev;
        }
        None
    }

    /// Cheap row-count estimate.
    ///
    /// No range and all-ranges report the live row count; degenerate ranges
    /// report the matched key's cardinality.
    pub fn cost(&self, range: Option<&C::Range>) -> u64 {
        let Some(range) = range else {
            return self.stats.total_rows();
        };
        if self.cmp.range_is_all(range) {
            return self.stats.total_rows();
        }
        if let Some(key) = self.cmp.range_only_key(range) {
            return self.get(&key).len() as u64;
        }
        // TODO: estimate range cardinality from leaf occupancy instead of
        // materializing the scan.
        self.get_range(Some(std::slice::from_ref(range)), false, None, None)
            .len() as u64
    }

    /// Resets to an empty single-leaf root and zeroes the row count. The
    /// max-key watermark survives: it tracks the largest key ever indexed.
    pub fn clear(&mut self) {
        self.arena.reset();
        self.root = self.arena.alloc(0);
        self.stats.reset_rows();
        tracing::debug!(target: "umber_btree::maintenance", name = %self.name, "index cleared");
    }

    pub(crate) fn reseat_root(&mut self, node: NodeId) {
        if node != self.root {
            self.arena.node_mut(node).parent = None;
            self.root = node;
            tracing::debug!(
                target: "umber_btree::mutation",
                node = self.arena.node(node).id,
                "root reseated after split"
            );
        }
    }

    /// Records an insertion in the stats, advancing the max-key watermark
    /// when `key` is the largest ever seen.
    pub(crate) fn note_add(&mut self, key: &C::Key, rows: u64) {
        let is_new_max = match self.stats.max_key_encountered() {
            None => true,
            Some(current) => matches!(self.cmp.max(key, current), Favor::Lhs),
        };
        self.stats.add(key, rows, is_new_max);
    }
}

impl<C: Comparator> fmt::Display for BTree<C> {
    /// Level-order dump: one line per level, `id[keys]` per node.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (unique: {})", self.name, self.unique)?;
        let mut level = vec![self.root];
        while !level.is_empty() {
            let mut next_level = Vec::new();
            for (i, &id) in level.iter().enumerate() {
                if i > 0 {
                    write!(f, "  ")?;
                }
                let node = self.arena.node(id);
                write!(f, "{}{:?}", node.id, node.keys)?;
                next_level.extend_from_slice(&node.children);
            }
            writeln!(f)?;
            level = next_level;
        }
        Ok(())
    }
}

impl<C: Comparator> Index for BTree<C> {
    type Cmp = C;

    fn name(&self) -> &str {
        BTree::name(self)
    }

    fn is_unique_key(&self) -> bool {
        BTree::is_unique_key(self)
    }

    fn comparator(&self) -> &C {
        BTree::comparator(self)
    }

    fn stats(&self) -> &IndexStats<C::Key> {
        BTree::stats(self)
    }

    fn add(&mut self, key: &C::Key, row: RowId) -> Result<()> {
        BTree::add(self, key, row)
    }

    fn set(&mut self, key: &C::Key, row: RowId) -> Result<()> {
        BTree::set(self, key, row)
    }

    fn remove(&mut self, key: &C::Key, row: Option<RowId>) {
        BTree::remove(self, key, row);
    }

    fn get(&self, key: &C::Key) -> Vec<RowId> {
        BTree::get(self, key)
    }

    fn contains_key(&self, key: &C::Key) -> bool {
        BTree::contains_key(self, key)
    }

    fn min(&self) -> Option<(C::Key, Vec<RowId>)> {
        BTree::min(self)
    }

    fn max(&self) -> Option<(C::Key, Vec<RowId>)> {
        BTree::max(self)
    }

    fn cost(&self, range: Option<&C::Range>) -> u64 {
        BTree::cost(self, range)
    }

    fn get_range(
        &self,
        ranges: Option<&[C::Range]>,
        reverse: bool,
        limit: Option<usize>,
        skip: Option<usize>,
    ) -> Vec<RowId> {
        BTree::get_range(self, ranges, reverse, limit, skip)
    }

    fn clear(&mut self) {
        BTree::clear(self);
    }

    fn serialize(&self) -> Vec<IndexRow<C::Key>> {
        BTree::serialize(self)
    }
}
