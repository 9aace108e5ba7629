//! CRUD operation registry and per-service capability sets.
//!
//! Every data-access service declares up front which operations it exposes.
//! An operation outside the declared set fails before any store access, so a
//! read-only service can never be coerced into writing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of operations a data-access service can expose.
///
/// The string form of each operation is stable; it appears in error messages
/// and denial logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CrudOperation {
    Count,
    Create,
    GetAll,
    Update,
    Delete,
    Exists,
    FindMany,
    SoftDelete,
    FindSingle,
    BulkCreate,
    FindOrCreate,
    FindManyOrCreateMany,
    SyncIndexes,
    DropIndexes,
    Search,
}

impl CrudOperation {
    /// Every operation, in registry order.
    pub const ALL: [Self; 15] = [
        Self::Count,
        Self::Create,
        Self::GetAll,
        Self::Update,
        Self::Delete,
        Self::Exists,
        Self::FindMany,
        Self::SoftDelete,
        Self::FindSingle,
        Self::BulkCreate,
        Self::FindOrCreate,
        Self::FindManyOrCreateMany,
        Self::SyncIndexes,
        Self::DropIndexes,
        Self::Search,
    ];

    /// Stable string id used in error messages and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Create => "create",
            Self::GetAll => "getAll",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Exists => "exists",
            Self::FindMany => "findMany",
            Self::SoftDelete => "softDelete",
            Self::FindSingle => "findSingle",
            Self::BulkCreate => "bulkCreate",
            Self::FindOrCreate => "findOrCreate",
            Self::FindManyOrCreateMany => "findManyOrCreateMany",
            Self::SyncIndexes => "syncIndexes",
            Self::DropIndexes => "dropIndexes",
            Self::Search => "search",
        }
    }

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for CrudOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrudOperation {
    type Err = CapabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| CapabilityError::UnknownOperation(s.to_string()))
    }
}

/// Errors raised when parsing operation names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
}

/// An immutable set of allowed operations, fixed at service construction.
///
/// Membership checks are O(1). There is no implicit allow-all default; a
/// service that really wants everything spells [`CapabilitySet::all`] at the
/// call site.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CapabilitySet(u16);

impl CapabilitySet {
    const ALL_BITS: u16 = (1 << CrudOperation::ALL.len()) - 1;

    /// The empty set. Every operation is denied.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// The full set. Every operation is allowed.
    #[must_use]
    pub const fn all() -> Self {
        Self(Self::ALL_BITS)
    }

    /// Builds a set from an explicit operation list.
    #[must_use]
    pub fn from_ops(ops: &[CrudOperation]) -> Self {
        ops.iter().copied().fold(Self::empty(), Self::with)
    }

    /// Returns a copy of the set with `op` added.
    #[must_use]
    pub const fn with(self, op: CrudOperation) -> Self {
        Self(self.0 | op.bit())
    }

    /// Whether `op` is a member of the set.
    #[must_use]
    pub const fn allows(&self, op: CrudOperation) -> bool {
        self.0 & op.bit() != 0
    }

    /// Number of allowed operations.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether the set denies everything.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterates the allowed operations in registry order.
    pub fn iter(&self) -> impl Iterator<Item = CrudOperation> + '_ {
        CrudOperation::ALL
            .into_iter()
            .filter(move |op| self.allows(*op))
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.iter().map(CrudOperation::as_str))
            .finish()
    }
}

impl FromIterator<CrudOperation> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = CrudOperation>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}
