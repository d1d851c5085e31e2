//! Index engine: comparators, statistics, and the B+ tree implementation.

use std::fmt;

use crate::error::Result;

pub mod btree;
pub mod comparator;
pub mod key;
pub mod stats;

pub use btree::{BTree, BTreeOptions, IndexRow, ValueEntry};
pub use comparator::{Comparator, Favor, MultiKeyComparator, Order, SimpleComparator};
pub use key::{KeyRange, MultiKey, RowId, Scalar, SingleKey};
pub use stats::{IndexStats, TreeMetrics, TreeMetricsSnapshot};

/// Capability contract implemented by every table index.
///
/// The query and transaction layers consume indices exclusively through this
/// surface. `Display` stands in for a structural `toString` and renders the
/// tree level by level.
pub trait Index: fmt::Display {
    /// Comparator governing this index's key order.
    type Cmp: Comparator;

    /// Index name, unique within its schema.
    fn name(&self) -> &str;

    /// Whether each key maps to exactly one row.
    fn is_unique_key(&self) -> bool;

    /// The comparator instance this index was built with.
    fn comparator(&self) -> &Self::Cmp;

    /// Running row count and max-key watermark.
    fn stats(&self) -> &IndexStats<<Self::Cmp as Comparator>::Key>;

    /// Insert a row id under `key`; fails on unique-key or row-id duplicates.
    fn add(&mut self, key: &<Self::Cmp as Comparator>::Key, row: RowId) -> Result<()>;

    /// Upsert: replace the value set for an existing key, insert otherwise.
    fn set(&mut self, key: &<Self::Cmp as Comparator>::Key, row: RowId) -> Result<()>;

    /// Remove one row id (non-unique trees) or the whole key entry.
    fn remove(&mut self, key: &<Self::Cmp as Comparator>::Key, row: Option<RowId>);

    /// Row ids stored under `key`, empty when absent.
    fn get(&self, key: &<Self::Cmp as Comparator>::Key) -> Vec<RowId>;

    /// Whether `key` is present.
    fn contains_key(&self, key: &<Self::Cmp as Comparator>::Key) -> bool;

    /// Smallest comparable key with its row ids.
    fn min(&self) -> Option<(<Self::Cmp as Comparator>::Key, Vec<RowId>)>;

    /// Largest comparable key with its row ids.
    fn max(&self) -> Option<(<Self::Cmp as Comparator>::Key, Vec<RowId>)>;

    /// Cheap row-count estimate for `range`.
    fn cost(&self, range: Option<&<Self::Cmp as Comparator>::Range>) -> u64;

    /// Evaluate a range scan; see [`BTree::get_range`].
    fn get_range(
        &self,
        ranges: Option<&[<Self::Cmp as Comparator>::Range]>,
        reverse: bool,
        limit: Option<usize>,
        skip: Option<usize>,
    ) -> Vec<RowId>;

    /// Reset to an empty index; the max-key watermark survives.
    fn clear(&mut self);

    /// Persisted rows, one per leaf in left-to-right order.
    fn serialize(&self) -> Vec<IndexRow<<Self::Cmp as Comparator>::Key>>;
}
