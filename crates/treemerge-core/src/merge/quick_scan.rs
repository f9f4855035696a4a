//! Quick-scan resolver: the fast path for entries at most one leaf touched.
//!
//! Each leaf's entry is classified against the ancestor entry
//! ([`classify`]). When no more than one leaf reports a change or a delete,
//! and no leaf carries a conflict left over from an earlier merge, the
//! result is decided without building a [`Conflict`](crate::model::Conflict):
//!
//! | Non-trivial leaves | Result |
//! |--------------------|--------|
//! | none | ancestor entry, unchanged |
//! | one, deleted | identity goes to the delete set |
//! | one, changed | that leaf's entry |
//!
//! Anything else falls through to the conflict builder, which must reach
//! the same decision on every entry the scan settles.

use crate::error::MergeError;
use crate::model::conflict::Leaf;
use crate::model::entry::{Entry, FieldChanges};

use super::engine::MergeState;

/// How one leaf's entry relates to the ancestor entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeafChange<'a> {
    /// The leaf holds an identical entry.
    Unchanged(&'a Entry),
    /// The leaf has no entry for the identity.
    Deleted,
    /// The leaf's entry differs in the given fields.
    Changed(&'a Entry, FieldChanges),
}

impl LeafChange<'_> {
    /// `true` for deletes and changes.
    #[must_use]
    pub const fn is_non_trivial(&self) -> bool {
        !matches!(self, Self::Unchanged(_))
    }
}

/// Classify `leaf` against `ancestor`.
///
/// # Errors
/// Returns [`MergeError::InvariantViolation`] if the leaf changed the
/// entry's kind, which a stable identity never does.
pub fn classify<'a>(
    ancestor: &Entry,
    leaf: Option<&'a Entry>,
) -> Result<LeafChange<'a>, MergeError> {
    let Some(entry) = leaf else {
        return Ok(LeafChange::Deleted);
    };
    let changes = entry.changes_from(ancestor);
    if changes.kind {
        return Err(MergeError::invariant(format!(
            "{} changed kind from {} to {}",
            ancestor.gid, ancestor.kind, entry.kind
        )));
    }
    if changes.is_empty() {
        Ok(LeafChange::Unchanged(entry))
    } else {
        Ok(LeafChange::Changed(entry, changes))
    }
}

/// Try to settle `ancestor`'s identity without building a conflict.
///
/// Returns `Ok(true)` if the result was written, `Ok(false)` if the entry
/// needs the full conflict builder.
///
/// # Errors
/// Propagates classification and container errors.
pub(crate) fn try_resolve(
    state: &mut MergeState<'_>,
    ancestor: &Entry,
) -> Result<bool, MergeError> {
    let gid = ancestor.gid;
    let mut non_trivial: Vec<(Leaf, LeafChange<'_>)> = Vec::with_capacity(2);

    for leaf in Leaf::ALL {
        if state.leaf_conflict(leaf, gid).is_some() {
            return Ok(false);
        }
        let change = classify(ancestor, state.leaf_entry(leaf, gid))?;
        if change.is_non_trivial() {
            non_trivial.push((leaf, change));
        }
    }

    match non_trivial.as_slice() {
        [] => state.result.insert_entry(ancestor.clone())?,
        [(leaf, LeafChange::Deleted)] => {
            tracing::trace!(gid = %gid, leaf = %leaf, "deleted on one side");
            state.result.register_delete(gid)?;
        }
        [(leaf, LeafChange::Changed(entry, changes))] => {
            tracing::trace!(gid = %gid, leaf = %leaf, changes = %changes, "changed on one side");
            state.result.insert_entry((*entry).clone())?;
        }
        _ => return Ok(false),
    }
    Ok(true)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
