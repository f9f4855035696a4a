//! Addition resolver: entries the ancestor walk never visited.
//!
//! An identity absent from the ancestor was either added by one leaf, added
//! identically by both (e.g. both merged the same earlier changeset), or
//! reached both leaves and then diverged. The last case has no usable
//! ancestor entry, so one is searched for in the item's own history: the
//! nearest changesets where the item changed that both leaves share.
//!
//! The search is a loop over a shrinking candidate pool:
//!
//! ```text
//! pool = history(gid, baseline) ∩ history(gid, other)
//! loop:
//!     pool empty             → no common basis
//!     closest = candidates not an ancestor of another candidate
//!     versions = item's entry in each closest candidate holding it
//!     all versions equal     → that version is the ancestor
//!     otherwise              → pool -= closest, retry
//! ```

use crate::error::MergeError;
use crate::model::conflict::{Conflict, ConflictCause, Leaf};
use crate::model::entry::Entry;
use crate::model::gid::{ChangesetId, Gid};

use super::engine::{MergeMode, MergeState, UpdateConflict};
use super::history::{closest_candidates, intersect};

/// Walk both leaves (baseline first) and settle every unvisited identity.
///
/// # Errors
/// - [`MergeError::NoCommonBasis`] in merge mode when a divergent addition
///   has no shared history.
/// - [`MergeError::Store`] when a collaborator fails.
/// - [`MergeError::InvariantViolation`] on container misuse.
pub fn resolve_additions(state: &mut MergeState<'_>) -> Result<(), MergeError> {
    for leaf in Leaf::ALL {
        let snapshot = state.leaf(leaf);
        for gid in snapshot.sorted_gids() {
            if state.is_visited(leaf, gid) {
                continue;
            }
            let Some(entry) = snapshot.entry(gid) else {
                continue;
            };
            state.mark_visited(leaf, gid);
            let peer = leaf.peer();
            state.mark_visited(peer, gid);

            match state.leaf_entry(peer, gid) {
                None if state.leaf(peer).is_deleted(gid) => {
                    resolve_against_history(state, gid, entry, true)?;
                }
                None => {
                    let nested = state.leaf_conflict(leaf, gid);
                    add_clean(state, entry, nested)?;
                    state.stats.clean_additions += 1;
                }
                Some(peer_entry) if peer_entry == entry => {
                    let nested = state
                        .leaf_conflict(leaf, gid)
                        .or_else(|| state.leaf_conflict(peer, gid));
                    add_clean(state, entry, nested)?;
                    state.stats.identical_additions += 1;
                }
                Some(_) => resolve_against_history(state, gid, entry, false)?,
            }
        }
    }
    Ok(())
}

/// Copy an addition, carrying a conflict a leaf still holds for it.
fn add_clean(
    state: &mut MergeState<'_>,
    entry: &Entry,
    nested: Option<&Conflict>,
) -> Result<(), MergeError> {
    state.result.insert_entry(entry.clone())?;
    if let Some(nested) = nested {
        let mut carried = nested.clone();
        carried.result = entry.clone();
        carried.causes.insert(ConflictCause::UnresolvedNested);
        state.result.register_conflict(entry.gid, carried)?;
    }
    Ok(())
}

/// Settle an identity both leaves know of but the ancestor does not.
///
/// `peer_deleted` is set when one leaf holds the item and the other only
/// remembers deleting it. Without a common basis that case is a plain
/// addition; otherwise it is the basis-less divergence of the two leaves.
fn resolve_against_history(
    state: &mut MergeState<'_>,
    gid: Gid,
    entry: &Entry,
    peer_deleted: bool,
) -> Result<(), MergeError> {
    if let Some(ancestor) = find_item_ancestor(state, gid)? {
        tracing::debug!(gid = %gid, name = %ancestor.name, "per-item ancestor found");
        state.stats.per_item_ancestors += 1;
        return state.resolve_against_item(ancestor);
    }

    if peer_deleted {
        tracing::debug!(gid = %gid, "no shared history with the deleting leaf; keeping addition");
        state.result.insert_entry(entry.clone())?;
        state.stats.clean_additions += 1;
        return Ok(());
    }

    let baseline = state.leaf(Leaf::Baseline);
    let path = baseline.path_of(gid);
    match state.options.mode {
        MergeMode::Merge => Err(MergeError::NoCommonBasis { gid, path }),
        MergeMode::Update => {
            let kept = baseline
                .entry(gid)
                .or_else(|| state.leaf_entry(Leaf::Other, gid))
                .ok_or_else(|| MergeError::invariant(format!("{gid} vanished from both leaves")))?;
            tracing::warn!(
                gid = %gid,
                path = path.as_deref().unwrap_or("?"),
                "both sides added this item differently with no common history; keeping baseline"
            );
            state.result.insert_entry(kept.clone())?;
            state.update_conflicts.push(UpdateConflict {
                gid,
                path,
                reason: "added on both sides with no common history".to_owned(),
            });
            Ok(())
        }
    }
}

/// Search the item's history for a version both leaves descend from.
///
/// Returns `Ok(None)` when the leaves share no changeset that holds the
/// item.
fn find_item_ancestor(state: &mut MergeState<'_>, gid: Gid) -> Result<Option<Entry>, MergeError> {
    let (Some(base_cs), Some(other_cs)) = (
        state.leaf(Leaf::Baseline).changeset.as_ref(),
        state.leaf(Leaf::Other).changeset.as_ref(),
    ) else {
        return Ok(None);
    };

    let base_history = state.history.history(gid, base_cs)?;
    let other_history = state.history.history(gid, other_cs)?;
    let mut pool: Vec<ChangesetId> = intersect(&base_history, &other_history);

    while !pool.is_empty() {
        let closest = closest_candidates(state.history, &pool)?;
        if closest.is_empty() {
            return Err(MergeError::invariant(format!(
                "history of {gid} is cyclic: every candidate is an ancestor of another"
            )));
        }

        let mut versions: Vec<Entry> = Vec::with_capacity(closest.len());
        for cs in &closest {
            let snapshot = state.cache.get(cs)?;
            if let Some(e) = snapshot.entry(gid) {
                versions.push(e.clone());
            }
        }

        if let Some(first) = versions.first()
            && versions.iter().all(|v| v == first)
        {
            return Ok(Some(first.clone()));
        }

        tracing::debug!(
            gid = %gid,
            candidates = closest.len(),
            versions = versions.len(),
            "closest candidates disagree; retrying with older history"
        );
        pool.retain(|cs| !closest.contains(cs));
    }
    Ok(None)
}
