//! Crate-wide error type and result alias.

use thiserror::Error;

/// Result alias used throughout the index engine.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors surfaced by index operations.
///
/// Duplicate errors propagate to the transaction layer, which is expected to
/// roll back the enclosing operation. Everything else that can go wrong at
/// query time (missing keys, empty ranges) yields empty results instead.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A unique-key tree already contains the inserted key.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    /// A non-unique insert supplied a row id already present for the key.
    #[error("duplicate row id for key: {0}")]
    DuplicateValue(String),
    /// Bulk input would exceed the depth the bulk builder supports.
    #[error("bulk input of {0} rows exceeds representable tree depth")]
    CapacityExceeded(usize),
    /// Invalid construction argument.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
}
