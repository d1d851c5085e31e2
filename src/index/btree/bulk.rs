//! Bottom-up bulk construction from pre-sorted data.
//!
//! Leaves are packed left to right, each taking the largest legal share of
//! what remains so that no node ends below minimum occupancy. Upper levels
//! are built the same way over the level below. Deserialization reuses the
//! upper-level builder over its relinked leaves.

use crate::error::{IndexError, Result};
use crate::index::comparator::Comparator;
use crate::index::key::RowId;

use super::types::{BTree, BTreeOptions, NodeId, ValueSet};

impl<C: Comparator> BTree<C> {
    /// Builds a tree from `(key, row ids)` pairs already sorted in index
    /// order with no duplicate keys.
    ///
    /// Fails with [`IndexError::CapacityExceeded`] when the input cannot fit
    /// in a tree of height three at this order.
    pub fn from_data(
        name: impl Into<String>,
        cmp: C,
        unique: bool,
        options: BTreeOptions,
        data: Vec<(C::Key, Vec<RowId>)>,
    ) -> Result<Self> {
        let mut tree = Self::with_options(name, cmp, unique, options)?;
        let cap = tree.max_keys * tree.max_keys * tree.max_keys;
        if data.len() >= cap {
            return Err(IndexError::CapacityExceeded(data.len()));
        }
        if data.is_empty() {
            return Ok(tree);
        }
        for (key, rows) in &data {
            tree.note_add(key, rows.len() as u64);
        }
        tree.arena.reset();
        let leaves = tree.create_leaves(data);
        tree.root = tree.build_upper_levels(leaves);
        tracing::debug!(
            target: "umber_btree::bulk",
            name = %tree.name,
            rows = tree.stats.total_rows(),
            "bulk construction finished"
        );
        Ok(tree)
    }

    /// Keys to pack into the next node given how many remain.
    ///
    /// Chunks stay within `[min_keys + 1, max_keys]` so a packed node can
    /// lose a key before any rebalancing; taking the maximum would strand a
    /// below-minimum tail, so the last two nodes of a level share the
    /// remainder instead.
    fn calc_node_len(&self, remaining: usize) -> usize {
        let min = self.min_keys + 1;
        let len = if remaining >= self.max_keys + min {
            self.max_keys
        } else if (min..=self.max_keys).contains(&remaining) {
            remaining
        } else {
            min
        };
        len.min(remaining)
    }

    /// Children to hang under the next internal node, same packing rule as
    /// [`calc_node_len`] shifted by one.
    ///
    /// [`calc_node_len`]: Self::calc_node_len
    fn calc_fanout(&self, remaining: usize) -> usize {
        let max = self.order;
        let min = self.min_keys + 1;
        let take = if remaining >= max + min {
            max
        } else if (min..=max).contains(&remaining) {
            remaining
        } else {
            min
        };
        take.min(remaining)
    }

    fn create_leaves(&mut self, data: Vec<(C::Key, Vec<RowId>)>) -> Vec<NodeId> {
        let mut remaining = data.len();
        let mut entries = data.into_iter();
        let mut leaves: Vec<NodeId> = Vec::new();
        while remaining > 0 {
            let take = self.calc_node_len(remaining);
            let leaf = self.arena.alloc(0);
            {
                let node = self.arena.node_mut(leaf);
                node.keys.reserve(take);
                node.values.reserve(take);
            }
            for _ in 0..take {
                if let Some((key, rows)) = entries.next() {
                    let node = self.arena.node_mut(leaf);
                    node.keys.push(key);
                    node.values.push(ValueSet::from_vec(rows));
                }
            }
            remaining -= take;
            if let Some(&prev) = leaves.last() {
                self.arena.node_mut(prev).next = Some(leaf);
                self.arena.node_mut(leaf).prev = Some(prev);
            }
            leaves.push(leaf);
        }
        leaves
    }

    /// Builds internal levels over `level` until a single root remains.
    pub(crate) fn build_upper_levels(&mut self, mut level: Vec<NodeId>) -> NodeId {
        while level.len() > 1 {
            let height = self.arena.node(level[0]).height + 1;
            let mut parents: Vec<NodeId> = Vec::new();
            let mut idx = 0;
            let mut remaining = level.len();
            while remaining > 0 {
                let take = self.calc_fanout(remaining);
                let parent = self.arena.alloc(height);
                for _ in 0..take {
                    let child = level[idx];
                    idx += 1;
                    self.arena.node_mut(child).parent = Some(parent);
                    self.arena.node_mut(parent).children.push(child);
                }
                remaining -= take;
                if let Some(&prev) = parents.last() {
                    self.arena.node_mut(prev).next = Some(parent);
                    self.arena.node_mut(parent).prev = Some(prev);
                }
                parents.push(parent);
            }
            for &parent in &parents {
                self.refresh_separators(parent);
            }
            level = parents;
        }
        match level.first() {
            Some(&root) => root,
            None => self.arena.alloc(0),
        }
    }
}
