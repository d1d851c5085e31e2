//! Range evaluation over the leaf chain.
//!
//! Unranged scans walk the chain linearly and window by offset. Ranged scans
//! descend to the leaf that could hold the first match, then follow `next`
//! pointers; a scan gives up after two consecutive leaves without a match,
//! which tolerates the one-leaf undershoot of composite-key descent.

use crate::index::comparator::{Comparator, Favor};
use crate::index::key::RowId;

use super::types::{BTree, NodeId, ScanState, ValueSet};

impl<C: Comparator> BTree<C> {
    /// Evaluates one or more ranges against the index.
    ///
    /// `ranges: None` scans everything. `limit` caps the result, `skip`
    /// drops matches from the front. A reverse scan yields the same matches
    /// in opposite order, with `skip` and `limit` applied after the
    /// reversal.
    pub fn get_range(
        &self,
        ranges: Option<&[C::Range]>,
        reverse: bool,
        limit: Option<usize>,
        skip: Option<usize>,
    ) -> Vec<RowId> {
        let total = self.stats.total_rows() as usize;
        let skip = skip.unwrap_or(0);
        let limit = limit.unwrap_or(usize::MAX);
        if limit == 0 || skip >= total {
            return Vec::new();
        }
        let max_count = limit.min(total - skip);
        match ranges {
            None => self.fill_linear(max_count, skip, reverse),
            Some(rs) if rs.len() == 1 && self.cmp.range_is_all(&rs[0]) => {
                self.fill_linear(max_count, skip, reverse)
            }
            Some(rs) => self.scan_ranges(rs, reverse, max_count, skip),
        }
    }

    /// Full scan: pure offset arithmetic over the leaf chain, no comparator
    /// calls.
    fn fill_linear(&self, max_count: usize, skip: usize, reverse: bool) -> Vec<RowId> {
        let mut out = Vec::with_capacity(max_count);
        let mut to_skip = skip;
        if reverse {
            let mut cur = Some(self.rightmost_leaf());
            while let Some(id) = cur {
                let node = self.arena.node(id);
                for values in node.values.iter().rev() {
                    for &row in values.iter().rev() {
                        if to_skip > 0 {
                            to_skip -= 1;
                            continue;
                        }
                        out.push(row);
                        if out.len() >= max_count {
                            return out;
                        }
                    }
                }
                cur = node.prev;
            }
        } else {
            let mut cur = Some(self.leftmost_leaf());
            while let Some(id) = cur {
                let node = self.arena.node(id);
                for values in &node.values {
                    for &row in values.iter() {
                        if to_skip > 0 {
                            to_skip -= 1;
                            continue;
                        }
                        out.push(row);
                        if out.len() >= max_count {
                            return out;
                        }
                    }
                }
                cur = node.next;
            }
        }
        out
    }

    fn scan_ranges(
        &self,
        ranges: &[C::Range],
        reverse: bool,
        max_count: usize,
        skip: usize,
    ) -> Vec<RowId> {
        let sorted = self.cmp.sort_key_ranges(ranges);
        // A reverse scan has no cheap entry point at the tail of a range, so
        // it collects every match forward into an oversized buffer first and
        // windows after reversing.
        let mut state = if reverse {
            ScanState::unbounded(true)
        } else {
            ScanState::new(max_count, skip, false)
        };
        let capacity = if reverse {
            (self.stats.total_rows() as usize).saturating_sub(skip)
        } else {
            max_count
        };
        let mut out = Vec::with_capacity(capacity);
        for range in &sorted {
            if state.done() {
                break;
            }
            self.scan_range(range, &mut state, &mut out);
        }
        if state.reverse {
            out.reverse();
            out.into_iter().skip(skip).take(max_count).collect()
        } else {
            out
        }
    }

    /// Walks the leaf chain from the range's entry leaf, emitting matches.
    fn scan_range(&self, range: &C::Range, state: &mut ScanState, out: &mut Vec<RowId>) {
        let mut cur = Some(self.containing_leaf(range));
        let mut strikes = 0u8;
        while let Some(id) = cur {
            if state.done() || strikes >= 2 {
                break;
            }
            let matched = self.emit_leaf_matches(id, range, state, out);
            if matched {
                strikes = 0;
            } else if state.skip == 0 {
                strikes += 1;
            }
            cur = self.arena.node(id).next;
        }
    }

    /// Emits every in-range value of one leaf. Returns whether the leaf held
    /// any match at all, counted or skipped.
    fn emit_leaf_matches(
        &self,
        leaf: NodeId,
        range: &C::Range,
        state: &mut ScanState,
        out: &mut Vec<RowId>,
    ) -> bool {
        let node = self.arena.node(leaf);
        if self.multi_dim {
            // Composite containment is a box over the dimensions; matches
            // inside one leaf need not be contiguous.
            let mut any = false;
            for (i, key) in node.keys.iter().enumerate() {
                if state.done() {
                    break;
                }
                if self.cmp.is_in_range(key, range) {
                    any = true;
                    self.emit_values(&node.values[i], state, out);
                }
            }
            any
        } else {
            let lo = node
                .keys
                .partition_point(|k| !self.cmp.compare_range(k, range).0);
            let hi = node
                .keys
                .partition_point(|k| self.cmp.compare_range(k, range).1);
            if lo >= hi {
                return false;
            }
            for i in lo..hi {
                if state.done() {
                    break;
                }
                self.emit_values(&node.values[i], state, out);
            }
            true
        }
    }

    fn emit_values(&self, values: &ValueSet, state: &mut ScanState, out: &mut Vec<RowId>) {
        for &row in values.iter() {
            if state.done() {
                return;
            }
            if state.skip > 0 {
                state.skip -= 1;
                continue;
            }
            state.count += 1;
            out.push(row);
        }
    }

    /// Descends to the leaf that could hold the first key of `range`.
    ///
    /// Composite probes carry unbound trailing dimensions, which compare as
    /// ties; those descend left so the scan cannot start past a match.
    fn containing_leaf(&self, range: &C::Range) -> NodeId {
        if self.cmp.is_left_open(range) {
            return self.leftmost_leaf();
        }
        let (from, _) = self.cmp.range_to_keys(range);
        tracing::trace!(
            target: "umber_btree::search",
            name = %self.name,
            from = ?from,
            "descending to range entry leaf"
        );
        let mut cur = self.root;
        loop {
            let node = self.arena.node(cur);
            if node.is_leaf() {
                self.metrics.inc_leaf_searches();
                return cur;
            }
            self.metrics.inc_internal_searches();
            let pos = if self.multi_dim {
                node.keys.partition_point(|k| {
                    matches!(self.cmp.compare_partial(&from, k), Favor::Lhs)
                })
            } else {
                let p = node
                    .keys
                    .partition_point(|k| matches!(self.cmp.compare(&from, k), Favor::Lhs));
                let exact = p < node.keys.len()
                    && matches!(self.cmp.compare(&from, &node.keys[p]), Favor::Tie);
                if exact {
                    p + 1
                } else {
                    p
                }
            };
            cur = node.children[pos];
        }
    }

    pub(crate) fn leftmost_leaf(&self) -> NodeId {
        let mut cur = self.root;
        loop {
            let node = self.arena.node(cur);
            match node.children.first() {
                Some(&child) => cur = child,
                None => return cur,
            }
        }
    }

    pub(crate) fn rightmost_leaf(&self) -> NodeId {
        let mut cur = self.root;
        loop {
            let node = self.arena.node(cur);
            match node.children.last() {
                Some(&child) => cur = child,
                None => return cur,
            }
        }
    }
}
