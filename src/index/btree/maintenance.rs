//! Delete path: key removal, sibling steals, merges, and separator repair.
//!
//! Separators are derived data: every internal key equals the leftmost leaf
//! key of its right child's subtree. Rather than patching individual slots,
//! each internal node on the deletion path recomputes its separators from its
//! children after the subtree below it has settled.

use crate::index::comparator::{Comparator, Favor};
use crate::index::key::RowId;

use super::types::{BTree, NodeId};

impl<C: Comparator> BTree<C> {
    /// Deletes from the subtree rooted at `node`. Returns whether a whole key
    /// entry was removed; removing one row id out of several is not a
    /// structural change and reports `false`.
    pub(crate) fn delete_at(
        &mut self,
        node: NodeId,
        key: &C::Key,
        value: Option<RowId>,
    ) -> bool {
        if self.arena.node(node).is_leaf() {
            return self.leaf_delete(node, key, value);
        }
        self.metrics.inc_internal_searches();
        let slot = {
            let n = self.arena.node(node);
            let pos = self.search_key(&n.keys, key);
            let exact = pos < n.keys.len()
                && matches!(self.cmp.compare(&n.keys[pos], key), Favor::Tie);
            if exact {
                pos + 1
            } else {
                pos
            }
        };
        let child = self.arena.node(node).children[slot];
        let removed = self.delete_at(child, key, value);
        if removed {
            self.rebalance_child(node, slot);
            self.refresh_separators(node);
        }
        removed
    }

    fn leaf_delete(&mut self, leaf: NodeId, key: &C::Key, value: Option<RowId>) -> bool {
        self.metrics.inc_leaf_searches();
        let (pos, exact) = {
            let n = self.arena.node(leaf);
            let pos = self.search_key(&n.keys, key);
            let exact = pos < n.keys.len()
                && matches!(self.cmp.compare(&n.keys[pos], key), Favor::Tie);
            (pos, exact)
        };
        if !exact {
            return false;
        }
        // Unique trees hold one row per key, so a value argument cannot
        // narrow the removal; only non-unique trees peel off single ids.
        if let (Some(row), false) = (value, self.unique) {
            let n = self.arena.node_mut(leaf);
            let set = &mut n.values[pos];
            let Some(idx) = set.iter().position(|r| *r == row) else {
                return false;
            };
            if set.len() > 1 {
                set.remove(idx);
                self.stats.remove(1);
                return false;
            }
        }
        let rows = {
            let n = self.arena.node_mut(leaf);
            n.keys.remove(pos);
            n.values.remove(pos).len() as u64
        };
        self.stats.remove(rows);
        true
    }

    /// Restores minimum occupancy of `parent.children[slot]` after a
    /// deletion below it: borrow from a sibling when one has spare keys,
    /// merge otherwise. Prefers the next sibling both times.
    ///
    /// Internal nodes run one key lower than leaves: splitting an even-order
    /// internal already leaves one half a key short of the leaf minimum, so
    /// that occupancy is settled, not underfull. A merged internal also
    /// regains the separator between the halves, so its room check counts
    /// one extra key.
    fn rebalance_child(&mut self, parent: NodeId, slot: usize) {
        let child = self.arena.node(parent).children[slot];
        let is_leaf = self.arena.node(child).is_leaf();
        let floor = if is_leaf {
            self.min_keys
        } else {
            self.min_keys - 1
        };
        let len = self.arena.node(child).keys.len();
        if len >= floor {
            return;
        }
        let hoisted = usize::from(!is_leaf);
        let siblings = self.arena.node(parent).children.len();
        if slot + 1 < siblings {
            let next = self.arena.node(parent).children[slot + 1];
            if self.arena.node(next).keys.len() > floor {
                self.steal_from_next(child, next, is_leaf);
                return;
            }
        }
        if slot > 0 {
            let prev = self.arena.node(parent).children[slot - 1];
            if self.arena.node(prev).keys.len() > floor {
                self.steal_from_prev(child, prev, is_leaf);
                return;
            }
        }
        if slot + 1 < siblings {
            let next = self.arena.node(parent).children[slot + 1];
            if len + self.arena.node(next).keys.len() + hoisted <= self.max_keys {
                self.merge(parent, slot, slot + 1);
                return;
            }
        }
        if slot > 0 {
            let prev = self.arena.node(parent).children[slot - 1];
            if len + self.arena.node(prev).keys.len() + hoisted <= self.max_keys {
                self.merge(parent, slot - 1, slot);
            }
        }
    }

    fn steal_from_next(&mut self, child: NodeId, next: NodeId, is_leaf: bool) {
        if is_leaf {
            self.metrics.inc_leaf_steals();
            let (key, values) = {
                let n = self.arena.node_mut(next);
                (n.keys.remove(0), n.values.remove(0))
            };
            let c = self.arena.node_mut(child);
            c.keys.push(key);
            c.values.push(values);
        } else {
            self.metrics.inc_internal_steals();
            let moved = {
                let n = self.arena.node_mut(next);
                n.keys.remove(0);
                n.children.remove(0)
            };
            self.arena.node_mut(moved).parent = Some(child);
            self.arena.node_mut(child).children.push(moved);
            self.refresh_separators(child);
        }
    }

    fn steal_from_prev(&mut self, child: NodeId, prev: NodeId, is_leaf: bool) {
        if is_leaf {
            self.metrics.inc_leaf_steals();
            let moved = {
                let p = self.arena.node_mut(prev);
                p.keys.pop().zip(p.values.pop())
            };
            if let Some((key, values)) = moved {
                let c = self.arena.node_mut(child);
                c.keys.insert(0, key);
                c.values.insert(0, values);
            }
        } else {
            self.metrics.inc_internal_steals();
            let moved = {
                let p = self.arena.node_mut(prev);
                p.keys.pop();
                p.children.pop()
            };
            if let Some(moved) = moved {
                self.arena.node_mut(moved).parent = Some(child);
                self.arena.node_mut(child).children.insert(0, moved);
                self.refresh_separators(child);
            }
        }
    }

    /// Folds `parent.children[right_slot]` into its left neighbor and drops
    /// the separator between them. The right node's arena slot is recycled.
    fn merge(&mut self, parent: NodeId, left_slot: usize, right_slot: usize) {
        let left = self.arena.node(parent).children[left_slot];
        let right = self.arena.node(parent).children[right_slot];
        let is_leaf = self.arena.node(left).is_leaf();
        if is_leaf {
            self.metrics.inc_leaf_merges();
        } else {
            self.metrics.inc_internal_merges();
        }
        let (keys, values, children, next) = {
            let r = self.arena.node_mut(right);
            (
                std::mem::take(&mut r.keys),
                std::mem::take(&mut r.values),
                std::mem::take(&mut r.children),
                r.next,
            )
        };
        for &child in &children {
            self.arena.node_mut(child).parent = Some(left);
        }
        {
            let l = self.arena.node_mut(left);
            l.keys.extend(keys);
            l.values.extend(values);
            l.children.extend(children);
            l.next = next;
        }
        if let Some(next) = next {
            self.arena.node_mut(next).prev = Some(left);
        }
        {
            let p = self.arena.node_mut(parent);
            p.children.remove(right_slot);
            p.keys.remove(right_slot - 1);
        }
        if !is_leaf {
            // An internal merge is one separator short until recomputed.
            self.refresh_separators(left);
        }
        tracing::debug!(
            target: "umber_btree::maintenance",
            node = self.arena.node(left).id,
            leaf = is_leaf,
            "merged sibling"
        );
        self.arena.release(right);
    }

    /// Recomputes an internal node's separators from its children's leftmost
    /// leaf keys.
    pub(crate) fn refresh_separators(&mut self, node: NodeId) {
        if self.arena.node(node).is_leaf() {
            return;
        }
        let tail: Vec<NodeId> = self.arena.node(node).children[1..].to_vec();
        let keys: Vec<C::Key> = tail.iter().map(|&c| self.leftmost_key(c)).collect();
        self.arena.node_mut(node).keys = keys;
    }

    fn leftmost_key(&self, node: NodeId) -> C::Key {
        let mut cur = node;
        loop {
            let n = self.arena.node(cur);
            match n.children.first() {
                Some(&child) => cur = child,
                None => return n.keys[0].clone(),
            }
        }
    }
}
