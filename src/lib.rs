#![forbid(unsafe_code)]

//! Embedded relational database engine: the B+ tree index subsystem.
//!
//! Every table index (primary key, unique, foreign key, user-defined) is
//! backed by an arena-allocated B+ tree. The crate exposes the tree facade,
//! the comparator seam it delegates key ordering to, and the persisted-row
//! codec used by the backing store.

pub mod error;
pub mod index;

pub use error::{IndexError, Result};
pub use index::{
    BTree, BTreeOptions, Comparator, Favor, Index, IndexRow, IndexStats, KeyRange,
    MultiKeyComparator, Order, RowId, Scalar, SimpleComparator, TreeMetrics, ValueEntry,
};
