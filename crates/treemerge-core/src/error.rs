//! Merge error types.
//!
//! Defines [`MergeError`], the error type of every fallible merge operation.
//! Divergence between leaves is never an error: renames, moves, attribute
//! and content conflicts are recorded as data and the merge runs to
//! completion. Only the cases below abort a merge, and an aborted merge
//! leaves nothing behind: inputs are read-only and the partial result is
//! dropped with the call frame.

use std::fmt;

use crate::model::gid::{ChangesetId, Gid};

// ---------------------------------------------------------------------------
// MergeError
// ---------------------------------------------------------------------------

/// Why a merge could not produce a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// Only two-leaf merges are implemented.
    UnsupportedTopology {
        /// Number of leaves the caller supplied.
        leaves: usize,
    },

    /// An internal consistency check failed (missing identity, double
    /// conflict attachment, malformed result, ...).
    InvariantViolation {
        /// Description of the broken invariant.
        detail: String,
    },

    /// Both leaves added the same item with different values and their
    /// histories share no changeset to use as the item's ancestor.
    NoCommonBasis {
        /// The item without a common basis.
        gid: Gid,
        /// Path of the item in the baseline leaf, when it can be computed.
        path: Option<String>,
    },

    /// An untracked item would be left inside a directory the merge deletes.
    UncontrolledOrphan {
        /// Name of the untracked item.
        name: String,
        /// The deleted directory it lives in.
        parent: Gid,
    },

    /// A snapshot loader or history service failed.
    Store(StoreError),
}

impl MergeError {
    /// Shorthand for [`MergeError::InvariantViolation`].
    #[must_use]
    pub fn invariant(detail: impl Into<String>) -> Self {
        Self::InvariantViolation {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedTopology { leaves } => {
                write!(
                    f,
                    "unsupported merge topology: {leaves} leaves given, exactly 2 are supported"
                )
            }
            Self::InvariantViolation { detail } => {
                write!(f, "merge invariant violated: {detail}")
            }
            Self::NoCommonBasis { gid, path } => {
                write!(f, "no common history for item {gid}")?;
                if let Some(p) = path {
                    write!(f, " ({p})")?;
                }
                write!(
                    f,
                    "\n  Both sides added it independently; resolve by removing one copy and retry."
                )
            }
            Self::UncontrolledOrphan { name, parent } => {
                write!(
                    f,
                    "untracked item {name:?} would be orphaned: its directory {parent} is deleted by the merge\n  To fix: add or remove the untracked item, then retry."
                )
            }
            Self::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for MergeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for MergeError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Failure reported by a snapshot loader or history service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    /// The changeset being read, if the failure concerns one.
    pub changeset: Option<ChangesetId>,
    /// Human-readable description.
    pub message: String,
}

impl StoreError {
    /// A failure about a specific changeset.
    #[must_use]
    pub fn for_changeset(changeset: &ChangesetId, message: impl Into<String>) -> Self {
        Self {
            changeset: Some(changeset.clone()),
            message: message.into(),
        }
    }

    /// A failure with no specific changeset.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            changeset: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.changeset {
            Some(cs) => write!(f, "store error at changeset {cs}: {}", self.message),
            None => write!(f, "store error: {}", self.message),
        }
    }
}

impl std::error::Error for StoreError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
