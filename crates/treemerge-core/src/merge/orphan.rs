//! Orphan repair.
//!
//! One leaf deletes a directory while the other adds or moves something
//! into it. Per-entry resolution accepts both changes, leaving a result
//! entry whose parent sits in the delete set. The directory is brought
//! back (from the baseline, else the other leaf, else the ancestor) and
//! flagged [`ConflictCause::DeleteCausedOrphan`]; restoring it may orphan
//! it in turn, so the restored directory goes back on the work list.
//!
//! Parents unknown to the result altogether are left for the final
//! well-formedness check: they mean a malformed input, not a merge effect.

use std::collections::VecDeque;

use crate::error::MergeError;
use crate::model::conflict::ConflictCause;
use crate::model::gid::Gid;

use super::engine::MergeState;

/// Restore every deleted parent still referenced from `seeds` onwards.
///
/// # Errors
/// Returns [`MergeError::InvariantViolation`] if a deleted parent has no
/// known version to restore.
pub fn repair_orphans(
    state: &mut MergeState<'_>,
    seeds: impl IntoIterator<Item = Gid>,
) -> Result<(), MergeError> {
    let mut queue: VecDeque<Gid> = seeds.into_iter().collect();

    while let Some(gid) = queue.pop_front() {
        let Some(parent) = state.result.entry(gid).and_then(|e| e.parent) else {
            continue;
        };
        if !state.result.is_deleted(parent) {
            continue;
        }
        let restored = state.known_entry(parent).ok_or_else(|| {
            MergeError::invariant(format!(
                "{gid} needs deleted parent {parent}, which no input holds"
            ))
        })?;
        tracing::debug!(
            gid = %gid,
            parent = %parent,
            name = %restored.name,
            "restoring deleted parent of orphan"
        );
        state.result.restore_entry(restored.clone())?;
        state.add_cause(parent, ConflictCause::DeleteCausedOrphan)?;
        state.stats.orphans_restored += 1;
        queue.push_back(parent);
    }
    Ok(())
}
