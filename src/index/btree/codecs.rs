//! Persisted form of a tree: one row per leaf, left to right.
//!
//! Only leaves are written; internal levels are derived data and get rebuilt
//! on load by the bulk builder. Persisted node ids are kept through a
//! round trip so row storage can be updated in place.

use serde::{Deserialize, Serialize};
use smallvec::smallvec;

use crate::error::{IndexError, Result};
use crate::index::comparator::Comparator;
use crate::index::key::RowId;

use super::types::{BTree, BTreeOptions, NodeId, ValueSet};

/// Value cell of a persisted leaf: unique trees write the bare row id,
/// non-unique trees write the id list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueEntry {
    /// Single row id of a unique-key entry.
    Single(RowId),
    /// Row ids of a non-unique entry.
    Multi(Vec<RowId>),
}

/// One persisted leaf: its node id plus parallel key and value arrays.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexRow<K> {
    /// Persisted node id, stable across round trips.
    pub id: u64,
    /// Leaf content as `(keys, values)`, index-aligned.
    pub payload: (Vec<K>, Vec<ValueEntry>),
}

impl<C: Comparator> BTree<C> {
    /// Snapshots every leaf into persistable rows. An empty tree yields one
    /// row for its empty root leaf.
    pub fn serialize(&self) -> Vec<IndexRow<C::Key>> {
        let mut rows = Vec::new();
        let mut cur = Some(self.leftmost_leaf());
        while let Some(id) = cur {
            let node = self.arena.node(id);
            let values = node
                .values
                .iter()
                .map(|set| match (self.unique, set.first()) {
                    (true, Some(&row)) => ValueEntry::Single(row),
                    _ => ValueEntry::Multi(set.to_vec()),
                })
                .collect();
            rows.push(IndexRow {
                id: node.id,
                payload: (node.keys.clone(), values),
            });
            cur = node.next;
        }
        rows
    }

    /// Rebuilds a tree from persisted rows at the default order.
    pub fn deserialize(
        name: impl Into<String>,
        cmp: C,
        unique: bool,
        rows: Vec<IndexRow<C::Key>>,
    ) -> Result<Self> {
        Self::deserialize_with_options(name, cmp, unique, BTreeOptions::default(), rows)
    }

    /// Rebuilds a tree from persisted rows.
    ///
    /// Leaves are relinked in row order, statistics replayed from their
    /// content, and internal levels rebuilt bottom-up. The node id factory
    /// is advanced past every persisted id so later splits stay fresh.
    pub fn deserialize_with_options(
        name: impl Into<String>,
        cmp: C,
        unique: bool,
        options: BTreeOptions,
        rows: Vec<IndexRow<C::Key>>,
    ) -> Result<Self> {
        let mut tree = Self::with_options(name, cmp, unique, options)?;
        if rows.is_empty() {
            return Ok(tree);
        }
        tree.arena.reset();
        let mut max_node_id = 0u64;
        let mut leaves: Vec<NodeId> = Vec::with_capacity(rows.len());
        for row in rows {
            max_node_id = max_node_id.max(row.id);
            let (keys, values) = row.payload;
            if keys.len() != values.len() {
                return Err(IndexError::Invalid("leaf row has mismatched key and value arity"));
            }
            let sets: Vec<ValueSet> = values
                .into_iter()
                .map(|value| match value {
                    ValueEntry::Single(id) => smallvec![id],
                    ValueEntry::Multi(ids) => ValueSet::from_vec(ids),
                })
                .collect();
            for (key, set) in keys.iter().zip(&sets) {
                tree.note_add(key, set.len() as u64);
            }
            let leaf = tree.arena.alloc(0);
            {
                let node = tree.arena.node_mut(leaf);
                node.id = row.id;
                node.keys = keys;
                node.values = sets;
            }
            if let Some(&prev) = leaves.last() {
                tree.arena.node_mut(prev).next = Some(leaf);
                tree.arena.node_mut(leaf).prev = Some(prev);
            }
            leaves.push(leaf);
        }
        tree.arena.bump_node_id(max_node_id + 1);
        tree.root = tree.build_upper_levels(leaves);
        Ok(tree)
    }
}
