//! Total order over keys and key ranges.
//!
//! The tree delegates every ordering decision to a [`Comparator`]. Single and
//! composite keys share one tree implementation; the comparator chosen at
//! construction time decides the key shape and the per-dimension sort order.

use std::cmp::Ordering;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::key::{KeyRange, MultiKey, Scalar, SingleKey};

/// Three-way comparison result.
///
/// `Lhs` means the left operand is favored, i.e. it sorts after the right
/// operand in index order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Favor {
    /// Left operand sorts after the right one.
    Lhs,
    /// Both operands are equal.
    Tie,
    /// Right operand sorts after the left one.
    Rhs,
}

impl Favor {
    fn from_ordering(ord: Ordering) -> Self {
        match ord {
            Ordering::Greater => Favor::Lhs,
            Ordering::Equal => Favor::Tie,
            Ordering::Less => Favor::Rhs,
        }
    }

    fn flip(self) -> Self {
        match self {
            Favor::Lhs => Favor::Rhs,
            Favor::Tie => Favor::Tie,
            Favor::Rhs => Favor::Lhs,
        }
    }
}

/// Sort order of one index dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Order {
    /// Ascending (the default).
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// Ordering contract consumed by the tree.
///
/// `compare` defines the physical key order of the tree. Range predicates are
/// expressed against the same order, so descending indices reorient range
/// bounds internally rather than leaking the flip to the tree.
pub trait Comparator {
    /// Key type this comparator orders.
    type Key: Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned;
    /// Range type matching the key shape.
    type Range: Clone + fmt::Debug;

    /// Compare two keys in index order.
    fn compare(&self, lhs: &Self::Key, rhs: &Self::Key) -> Favor;

    /// Compare for containing-leaf descent: unbound dimensions of `probe`
    /// compare as ties, so partially bound composite probes land at the
    /// leftmost candidate position.
    fn compare_partial(&self, probe: &Self::Key, stored: &Self::Key) -> Favor {
        self.compare(probe, stored)
    }

    /// Which key is the minimum by natural value, independent of sort order.
    fn min(&self, lhs: &Self::Key, rhs: &Self::Key) -> Favor;

    /// Which key is the maximum by natural value, independent of sort order.
    fn max(&self, lhs: &Self::Key, rhs: &Self::Key) -> Favor;

    /// Returns `(covers_lower, covers_upper)`: whether `key` is at-or-after
    /// the range's lower bound and at-or-before its upper bound, in index
    /// order.
    fn compare_range(&self, key: &Self::Key, range: &Self::Range) -> (bool, bool);

    /// Whether `key` falls inside `range`.
    fn is_in_range(&self, key: &Self::Key, range: &Self::Range) -> bool {
        let (covers_lower, covers_upper) = self.compare_range(key, range);
        covers_lower && covers_upper
    }

    /// Whether the first dimension of `key` falls inside the first dimension
    /// of `range`.
    fn is_first_key_in_range(&self, key: &Self::Key, range: &Self::Range) -> bool;

    /// Whether the range has no lower bound in index order.
    fn is_left_open(&self, range: &Self::Range) -> bool;

    /// The range's corner keys in index order, with unbound dimensions mapped
    /// to the null sentinel.
    fn range_to_keys(&self, range: &Self::Range) -> (Self::Key, Self::Key);

    /// Ranges sorted so that scanning them in sequence yields results in
    /// index order.
    fn sort_key_ranges(&self, ranges: &[Self::Range]) -> Vec<Self::Range>;

    /// Number of key dimensions.
    fn key_dimensions(&self) -> usize;

    /// Whether the key participates in `min`/`max` (first dimension bound).
    fn is_comparable(&self, key: &Self::Key) -> bool;

    /// Whether the range covers every key.
    fn range_is_all(&self, range: &Self::Range) -> bool;

    /// The single key a degenerate range matches, if any.
    fn range_only_key(&self, range: &Self::Range) -> Option<Self::Key>;
}

fn cmp_scalar(lhs: &Scalar, rhs: &Scalar) -> Ordering {
    match (lhs, rhs) {
        (Scalar::Int(a), Scalar::Int(b)) => a.cmp(b),
        (Scalar::Text(a), Scalar::Text(b)) => a.cmp(b),
        (Scalar::Int(_), Scalar::Text(_)) => Ordering::Less,
        (Scalar::Text(_), Scalar::Int(_)) => Ordering::Greater,
    }
}

// Nulls sort before every bound value in column order.
fn cmp_single(lhs: &SingleKey, rhs: &SingleKey) -> Ordering {
    match (lhs, rhs) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => cmp_scalar(a, b),
    }
}

/// Comparator over single-column keys.
#[derive(Clone, Debug)]
pub struct SimpleComparator {
    order: Order,
}

impl SimpleComparator {
    /// Comparator with the given sort order.
    pub fn new(order: Order) -> Self {
        Self { order }
    }

    /// Ascending comparator.
    pub fn asc() -> Self {
        Self::new(Order::Asc)
    }

    /// Descending comparator.
    pub fn desc() -> Self {
        Self::new(Order::Desc)
    }

    /// Range bounds oriented to index order: `(lower, exclude_lower, upper,
    /// exclude_upper)`.
    fn orient<'a>(
        &self,
        range: &'a KeyRange,
    ) -> (&'a Option<Scalar>, bool, &'a Option<Scalar>, bool) {
        match self.order {
            Order::Asc => (&range.from, range.exclude_lower, &range.to, range.exclude_upper),
            Order::Desc => (&range.to, range.exclude_upper, &range.from, range.exclude_lower),
        }
    }
}

impl Comparator for SimpleComparator {
    type Key = SingleKey;
    type Range = KeyRange;

    fn compare(&self, lhs: &SingleKey, rhs: &SingleKey) -> Favor {
        let favor = Favor::from_ordering(cmp_single(lhs, rhs));
        match self.order {
            Order::Asc => favor,
            Order::Desc => favor.flip(),
        }
    }

    fn min(&self, lhs: &SingleKey, rhs: &SingleKey) -> Favor {
        Favor::from_ordering(cmp_single(rhs, lhs))
    }

    fn max(&self, lhs: &SingleKey, rhs: &SingleKey) -> Favor {
        Favor::from_ordering(cmp_single(lhs, rhs))
    }

    fn compare_range(&self, key: &SingleKey, range: &KeyRange) -> (bool, bool) {
        let (lower, exclude_lower, upper, exclude_upper) = self.orient(range);
        let covers_lower = match lower {
            None => true,
            Some(bound) => match self.compare(key, &Some(bound.clone())) {
                Favor::Lhs => true,
                Favor::Tie => !exclude_lower,
                Favor::Rhs => false,
            },
        };
        let covers_upper = match upper {
            None => true,
            Some(bound) => match self.compare(key, &Some(bound.clone())) {
                Favor::Rhs => true,
                Favor::Tie => !exclude_upper,
                Favor::Lhs => false,
            },
        };
        (covers_lower, covers_upper)
    }

    fn is_first_key_in_range(&self, key: &SingleKey, range: &KeyRange) -> bool {
        self.is_in_range(key, range)
    }

    fn is_left_open(&self, range: &KeyRange) -> bool {
        let (lower, _, _, _) = self.orient(range);
        lower.is_none()
    }

    fn range_to_keys(&self, range: &KeyRange) -> (SingleKey, SingleKey) {
        let (lower, _, upper, _) = self.orient(range);
        (lower.clone(), upper.clone())
    }

    fn sort_key_ranges(&self, ranges: &[KeyRange]) -> Vec<KeyRange> {
        let mut sorted = ranges.to_vec();
        sorted.sort_by(|a, b| match (self.is_left_open(a), self.is_left_open(b)) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => {
                let (from_a, _) = self.range_to_keys(a);
                let (from_b, _) = self.range_to_keys(b);
                match self.compare(&from_a, &from_b) {
                    Favor::Lhs => Ordering::Greater,
                    Favor::Tie => Ordering::Equal,
                    Favor::Rhs => Ordering::Less,
                }
            }
        });
        sorted
    }

    fn key_dimensions(&self) -> usize {
        1
    }

    fn is_comparable(&self, key: &SingleKey) -> bool {
        key.is_some()
    }

    fn range_is_all(&self, range: &KeyRange) -> bool {
        range.is_all()
    }

    fn range_only_key(&self, range: &KeyRange) -> Option<SingleKey> {
        if range.is_only() {
            range.from.clone().map(Some)
        } else {
            None
        }
    }
}

/// Comparator over composite (cross-column) keys, one sort order per
/// dimension.
#[derive(Clone, Debug)]
pub struct MultiKeyComparator {
    dims: Vec<SimpleComparator>,
}

impl MultiKeyComparator {
    /// Comparator with one order per key dimension.
    pub fn new(orders: Vec<Order>) -> Self {
        let dims = orders.into_iter().map(SimpleComparator::new).collect();
        Self { dims }
    }

    /// All-ascending comparator over `dimensions` columns.
    pub fn ascending(dimensions: usize) -> Self {
        Self::new(vec![Order::Asc; dimensions])
    }
}

impl Comparator for MultiKeyComparator {
    type Key = MultiKey;
    type Range = Vec<KeyRange>;

    fn compare(&self, lhs: &MultiKey, rhs: &MultiKey) -> Favor {
        for (dim, (a, b)) in self.dims.iter().zip(lhs.iter().zip(rhs.iter())) {
            match dim.compare(a, b) {
                Favor::Tie => continue,
                favor => return favor,
            }
        }
        Favor::Tie
    }

    fn compare_partial(&self, probe: &MultiKey, stored: &MultiKey) -> Favor {
        for (dim, (a, b)) in self.dims.iter().zip(probe.iter().zip(stored.iter())) {
            if a.is_none() {
                continue;
            }
            match dim.compare(a, b) {
                Favor::Tie => continue,
                favor => return favor,
            }
        }
        Favor::Tie
    }

    fn min(&self, lhs: &MultiKey, rhs: &MultiKey) -> Favor {
        for (a, b) in lhs.iter().zip(rhs.iter()) {
            match cmp_single(a, b) {
                Ordering::Equal => continue,
                Ordering::Less => return Favor::Lhs,
                Ordering::Greater => return Favor::Rhs,
            }
        }
        Favor::Tie
    }

    fn max(&self, lhs: &MultiKey, rhs: &MultiKey) -> Favor {
        for (a, b) in lhs.iter().zip(rhs.iter()) {
            match cmp_single(a, b) {
                Ordering::Equal => continue,
                Ordering::Greater => return Favor::Lhs,
                Ordering::Less => return Favor::Rhs,
            }
        }
        Favor::Tie
    }

    fn compare_range(&self, key: &MultiKey, range: &Vec<KeyRange>) -> (bool, bool) {
        let mut covers_lower = true;
        let mut covers_upper = true;
        for (dim, (k, r)) in self.dims.iter().zip(key.iter().zip(range.iter())) {
            let (lo, hi) = dim.compare_range(k, r);
            covers_lower = covers_lower && lo;
            covers_upper = covers_upper && hi;
            if !covers_lower && !covers_upper {
                break;
            }
        }
        (covers_lower, covers_upper)
    }

    // Per-dimension containment: coverage can be discontinuous in index
    // order, which is why cross-column scans filter linearly.
    fn is_in_range(&self, key: &MultiKey, range: &Vec<KeyRange>) -> bool {
        self.dims
            .iter()
            .zip(key.iter().zip(range.iter()))
            .all(|(dim, (k, r))| dim.is_in_range(k, r))
    }

    fn is_first_key_in_range(&self, key: &MultiKey, range: &Vec<KeyRange>) -> bool {
        match (self.dims.first(), key.first(), range.first()) {
            (Some(dim), Some(k), Some(r)) => dim.is_in_range(k, r),
            _ => false,
        }
    }

    fn is_left_open(&self, range: &Vec<KeyRange>) -> bool {
        match (self.dims.first(), range.first()) {
            (Some(dim), Some(r)) => dim.is_left_open(r),
            _ => true,
        }
    }

    fn range_to_keys(&self, range: &Vec<KeyRange>) -> (MultiKey, MultiKey) {
        let mut lower = Vec::with_capacity(range.len());
        let mut upper = Vec::with_capacity(range.len());
        for (dim, r) in self.dims.iter().zip(range.iter()) {
            let (lo, hi) = dim.range_to_keys(r);
            lower.push(lo);
            upper.push(hi);
        }
        (lower, upper)
    }

    fn sort_key_ranges(&self, ranges: &[Vec<KeyRange>]) -> Vec<Vec<KeyRange>> {
        let mut sorted = ranges.to_vec();
        sorted.sort_by(|a, b| match (self.is_left_open(a), self.is_left_open(b)) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => {
                let (from_a, _) = self.range_to_keys(a);
                let (from_b, _) = self.range_to_keys(b);
                match self.compare_partial(&from_a, &from_b) {
                    Favor::Lhs => Ordering::Greater,
                    Favor::Tie => Ordering::Equal,
                    Favor::Rhs => Ordering::Less,
                }
            }
        });
        sorted
    }

    fn key_dimensions(&self) -> usize {
        self.dims.len()
    }

    fn is_comparable(&self, key: &MultiKey) -> bool {
        matches!(key.first(), Some(Some(_)))
    }

    fn range_is_all(&self, range: &Vec<KeyRange>) -> bool {
        range.iter().all(KeyRange::is_all)
    }

    fn range_only_key(&self, range: &Vec<KeyRange>) -> Option<MultiKey> {
        let mut key = Vec::with_capacity(range.len());
        for r in range {
            if !r.is_only() {
                return None;
            }
            key.push(r.from.clone());
        }
        Some(key)
    }
}
