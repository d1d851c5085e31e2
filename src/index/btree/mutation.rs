//! Insert path: leaf insertion, node splits, and split-marker absorption.
//!
//! A split materializes as a transient marker node, an internal node with one
//! separator and two children. The caller one level up either absorbs the
//! marker into itself or, at the root, keeps it as the new root.

use smallvec::smallvec;

use crate::error::{IndexError, Result};
use crate::index::comparator::{Comparator, Favor};
use crate::index::key::RowId;

use super::types::{BTree, NodeId};

impl<C: Comparator> BTree<C> {
    /// First slot whose key does not sort before `key`.
    pub(crate) fn search_key(&self, keys: &[C::Key], key: &C::Key) -> usize {
        keys.partition_point(|k| matches!(self.cmp.compare(k, key), Favor::Rhs))
    }

    /// Inserts into the subtree rooted at `node` and returns the node now
    /// heading it. The result differs from `node` only when a split bubbled
    /// all the way up, in which case it is an unabsorbed marker.
    pub(crate) fn insert_at(
        &mut self,
        node: NodeId,
        key: &C::Key,
        row: RowId,
        replace: bool,
    ) -> Result<NodeId> {
        if self.arena.node(node).is_leaf() {
            return self.leaf_insert(node, key, row, replace);
        }
        self.metrics.inc_internal_searches();
        let slot = {
            let n = self.arena.node(node);
            let pos = self.search_key(&n.keys, key);
            let exact = pos < n.keys.len()
                && matches!(self.cmp.compare(&n.keys[pos], key), Favor::Tie);
            // A tied separator means the key lives at the front of the right
            // subtree.
            if exact {
                pos + 1
            } else {
                pos
            }
        };
        let child = self.arena.node(node).children[slot];
        let returned = self.insert_at(child, key, row, replace)?;
        if returned != child {
            self.absorb_marker(node, slot, returned);
            if self.arena.node(node).keys.len() > self.max_keys {
                return Ok(self.split_internal(node));
            }
        }
        Ok(node)
    }

    fn leaf_insert(
        &mut self,
        leaf: NodeId,
        key: &C::Key,
        row: RowId,
        replace: bool,
    ) -> Result<NodeId> {
        self.metrics.inc_leaf_searches();
        let (pos, exact) = {
            let n = self.arena.node(leaf);
            let pos = self.search_key(&n.keys, key);
            let exact = pos < n.keys.len()
                && matches!(self.cmp.compare(&n.keys[pos], key), Favor::Tie);
            (pos, exact)
        };
        if exact {
            if replace {
                let displaced = {
                    let n = self.arena.node_mut(leaf);
                    std::mem::replace(&mut n.values[pos], smallvec![row])
                };
                self.stats.remove(displaced.len() as u64);
                self.note_add(key, 1);
                return Ok(leaf);
            }
            if self.unique {
                return Err(IndexError::DuplicateKey(format!("{key:?}")));
            }
            {
                let n = self.arena.node_mut(leaf);
                if n.values[pos].contains(&row) {
                    return Err(IndexError::DuplicateValue(format!("{key:?}")));
                }
                n.values[pos].push(row);
            }
            self.note_add(key, 1);
            return Ok(leaf);
        }
        {
            let n = self.arena.node_mut(leaf);
            n.keys.insert(pos, key.clone());
            n.values.insert(pos, smallvec![row]);
        }
        self.note_add(key, 1);
        if self.arena.node(leaf).keys.len() > self.max_keys {
            return Ok(self.split_leaf(leaf));
        }
        Ok(leaf)
    }

    /// Splits an overflowing leaf and returns the marker heading both halves.
    fn split_leaf(&mut self, leaf: NodeId) -> NodeId {
        self.metrics.inc_leaf_splits();
        let half = self.arena.node(leaf).keys.len() >> 1;
        let right = self.arena.alloc(0);
        let (moved_keys, moved_values, old_next) = {
            let n = self.arena.node_mut(leaf);
            (n.keys.split_off(half), n.values.split_off(half), n.next)
        };
        {
            let r = self.arena.node_mut(right);
            r.keys = moved_keys;
            r.values = moved_values;
            r.prev = Some(leaf);
            r.next = old_next;
        }
        self.arena.node_mut(leaf).next = Some(right);
        if let Some(next) = old_next {
            self.arena.node_mut(next).prev = Some(right);
        }
        let sep = self.arena.node(right).keys[0].clone();
        tracing::debug!(
            target: "umber_btree::mutation",
            node = self.arena.node(leaf).id,
            sibling = self.arena.node(right).id,
            "leaf split"
        );
        self.new_marker(leaf, right, sep, 1)
    }

    /// Splits an overflowing internal node. The middle separator moves up
    /// into the marker instead of staying in either half.
    fn split_internal(&mut self, node: NodeId) -> NodeId {
        self.metrics.inc_internal_splits();
        let height = self.arena.node(node).height;
        let half = self.arena.node(node).keys.len() >> 1;
        let right = self.arena.alloc(height);
        let (sep, moved_keys, moved_children, old_next) = {
            let n = self.arena.node_mut(node);
            let mut tail = n.keys.split_off(half);
            let sep = tail.remove(0);
            let moved_children = n.children.split_off(half + 1);
            (sep, tail, moved_children, n.next)
        };
        for &child in &moved_children {
            self.arena.node_mut(child).parent = Some(right);
        }
        {
            let r = self.arena.node_mut(right);
            r.keys = moved_keys;
            r.children = moved_children;
            r.prev = Some(node);
            r.next = old_next;
        }
        self.arena.node_mut(node).next = Some(right);
        if let Some(next) = old_next {
            self.arena.node_mut(next).prev = Some(right);
        }
        tracing::debug!(
            target: "umber_btree::mutation",
            node = self.arena.node(node).id,
            sibling = self.arena.node(right).id,
            "internal split"
        );
        self.new_marker(node, right, sep, height + 1)
    }

    fn new_marker(&mut self, left: NodeId, right: NodeId, sep: C::Key, height: u16) -> NodeId {
        let marker = self.arena.alloc(height);
        {
            let m = self.arena.node_mut(marker);
            m.keys.push(sep);
            m.children.push(left);
            m.children.push(right);
        }
        self.arena.node_mut(left).parent = Some(marker);
        self.arena.node_mut(right).parent = Some(marker);
        marker
    }

    /// Replaces the child at `slot` with the marker's two children and hoists
    /// its separator, then retires the marker slot.
    fn absorb_marker(&mut self, parent: NodeId, slot: usize, marker: NodeId) {
        let (keys, children) = {
            let m = self.arena.node_mut(marker);
            (std::mem::take(&mut m.keys), std::mem::take(&mut m.children))
        };
        for &child in &children {
            self.arena.node_mut(child).parent = Some(parent);
        }
        {
            let p = self.arena.node_mut(parent);
            p.children.splice(slot..=slot, children);
            p.keys.splice(slot..slot, keys);
        }
        self.arena.release(marker);
    }
}
