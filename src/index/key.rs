//! Key scalars, row identifiers, and single-dimension key ranges.

use serde::{Deserialize, Serialize};

/// Stable identifier of a persisted record, stored as the leaf value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub u64);

impl std::fmt::Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scalar value of one key dimension.
///
/// Columns are typed, so a well-formed index never mixes variants within one
/// dimension; when it happens anyway, integers order before text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Integer column value.
    Int(i64),
    /// Text column value.
    Text(String),
}

/// One dimension of an index key. `None` is the null/unbound sentinel.
pub type SingleKey = Option<Scalar>;

/// Composite key for a cross-column index, one entry per dimension.
pub type MultiKey = Vec<SingleKey>;

/// Inclusive-by-default range over one key dimension.
///
/// `None` bounds are unbound. Stored in column order; comparators with a
/// descending sort order reorient the bounds at evaluation time.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyRange {
    /// Lower bound in column order, `None` when unbound.
    pub from: Option<Scalar>,
    /// Upper bound in column order, `None` when unbound.
    pub to: Option<Scalar>,
    /// Whether the lower bound itself is excluded.
    pub exclude_lower: bool,
    /// Whether the upper bound itself is excluded.
    pub exclude_upper: bool,
}

impl KeyRange {
    /// Range covering every key.
    pub fn all() -> Self {
        Self {
            from: None,
            to: None,
            exclude_lower: false,
            exclude_upper: false,
        }
    }

    /// Degenerate range matching exactly one key.
    pub fn only(value: Scalar) -> Self {
        Self {
            from: Some(value.clone()),
            to: Some(value),
            exclude_lower: false,
            exclude_upper: false,
        }
    }

    /// Range `[value, +inf)` or `(value, +inf)`.
    pub fn lower_bound(value: Scalar, exclude: bool) -> Self {
        Self {
            from: Some(value),
            to: None,
            exclude_lower: exclude,
            exclude_upper: false,
        }
    }

    /// Range `(-inf, value]` or `(-inf, value)`.
    pub fn upper_bound(value: Scalar, exclude: bool) -> Self {
        Self {
            from: None,
            to: Some(value),
            exclude_lower: false,
            exclude_upper: exclude,
        }
    }

    /// Closed range `[from, to]`.
    pub fn between(from: Scalar, to: Scalar) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            exclude_lower: false,
            exclude_upper: false,
        }
    }

    /// Whether this range covers every key.
    pub fn is_all(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Whether this range matches exactly one key.
    pub fn is_only(&self) -> bool {
        self.from.is_some()
            && self.from == self.to
            && !self.exclude_lower
            && !self.exclude_upper
    }
}
