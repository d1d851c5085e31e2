//! Arena-backed B+ tree: structure, mutation, bulk construction, range
//! scans, and the persisted-row codec.

mod api;
mod bulk;
mod codecs;
mod maintenance;
mod mutation;
mod scan;
mod types;

pub use codecs::{IndexRow, ValueEntry};
pub use types::{BTree, BTreeOptions, DEFAULT_ORDER};

#[cfg(test)]
mod tests;
