//! Conflict builder: the hard way.
//!
//! Used for every entry the quick scan declines: both leaves touched the
//! entry, or a leaf still carries a conflict from an earlier merge. Each
//! field is collapsed independently (see [`super::collapse`]) into one
//! composed entry seeded from the baseline (or the ancestor when the
//! baseline deleted the item). If no field raised a cause the composed
//! entry goes into the result clean; otherwise a [`Conflict`] recording the
//! causes, the deleting leaves and the per-field choices is attached.

use crate::error::MergeError;
use crate::model::conflict::{Causes, Conflict, ConflictCause, Leaf};
use crate::model::entry::Entry;
use crate::model::gid::{ContentHash, Gid};

use super::collapse::Collapse;
use super::engine::MergeState;
use super::quick_scan::{LeafChange, classify};

/// Compose the result for `ancestor`'s identity from both leaves.
///
/// # Errors
/// Returns [`MergeError::InvariantViolation`] on a kind change, on a leaf
/// that turned a non-root entry into a root, or on container misuse.
pub fn build(state: &mut MergeState<'_>, ancestor: &Entry) -> Result<(), MergeError> {
    let gid = ancestor.gid;
    let baseline = state.leaf_entry(Leaf::Baseline, gid);

    let mut deleted_by: Vec<Leaf> = Vec::new();
    let mut changed: Vec<(Leaf, &Entry)> = Vec::new();
    let mut nested = Causes::new();
    let mut has_nested = false;

    for leaf in Leaf::ALL {
        if let Some(conflict) = state.leaf_conflict(leaf, gid) {
            has_nested = true;
            nested.extend(&conflict.causes);
        }
        match classify(ancestor, state.leaf_entry(leaf, gid))? {
            LeafChange::Deleted => deleted_by.push(leaf),
            LeafChange::Unchanged(_) => {}
            LeafChange::Changed(entry, _) => changed.push((leaf, entry)),
        }
    }

    if changed.is_empty() && !deleted_by.is_empty() && !has_nested {
        tracing::trace!(gid = %gid, "deleted without competing edits");
        return state.result.register_delete(gid);
    }

    let any_deleted = !deleted_by.is_empty();
    let seed = baseline.unwrap_or(ancestor);
    let mut causes = Causes::new();

    let mut parent: Collapse<Gid> = Collapse::new();
    let mut name: Collapse<String> = Collapse::new();
    let mut attrs: Collapse<u64> = Collapse::new();
    let mut hash: Collapse<Option<ContentHash>> = Collapse::new();

    for &(leaf, entry) in &changed {
        if entry.parent != ancestor.parent {
            let Some(p) = entry.parent else {
                return Err(MergeError::invariant(format!(
                    "{gid} became a root in {leaf}"
                )));
            };
            parent.record(leaf, p);
        }
        if entry.name != ancestor.name {
            name.record(leaf, entry.name.clone());
        }
        if entry.attrs != ancestor.attrs {
            attrs.record(leaf, entry.attrs);
        }
        if entry.hash != ancestor.hash {
            hash.record(leaf, entry.hash.clone());
        }
    }

    let (parent_value, parent_divergent) = match seed.parent {
        Some(seed_parent) => {
            let (p, div) = parent.resolve(
                seed_parent,
                any_deleted,
                Some(ConflictCause::DivergentMove),
                Some(ConflictCause::DeleteVsMove),
                &mut causes,
            );
            (Some(p), div)
        }
        None => (None, false),
    };
    let (name_value, name_divergent) = name.resolve(
        seed.name.clone(),
        any_deleted,
        Some(ConflictCause::DivergentRename),
        Some(ConflictCause::DeleteVsRename),
        &mut causes,
    );
    let (attrs_value, attrs_divergent) = attrs.resolve(
        seed.attrs,
        any_deleted,
        Some(ConflictCause::DivergentAttrs),
        Some(ConflictCause::DeleteVsAttrs),
        &mut causes,
    );
    let (mut hash_value, hash_divergent) = hash.resolve(
        seed.hash.clone(),
        any_deleted,
        ConflictCause::divergent_edit(ancestor.kind),
        ConflictCause::delete_vs_edit(ancestor.kind),
        &mut causes,
    );
    if hash_divergent {
        // Content is settled by a later content merge or by the user.
        hash_value = None;
    }

    if has_nested {
        causes.insert(ConflictCause::UnresolvedNested);
        causes.extend(&nested);
    }

    let composed = seed
        .with_parent(parent_value)
        .with_name(name_value)
        .with_attrs(attrs_value)
        .with_hash(hash_value);

    if causes.is_empty() {
        return state.result.insert_entry(composed);
    }

    let parent_touched = parent.touched();
    let name_touched = name.touched();
    let attrs_touched = attrs.touched();
    let hash_touched = hash.touched();

    let mut conflict = Conflict::new(Some(ancestor.clone()), baseline.cloned(), composed.clone());
    conflict.causes = causes;
    conflict.deleted_by = deleted_by;
    conflict.parent_choices =
        parent.choices_if(parent_divergent || (any_deleted && parent_touched));
    conflict.name_choices = name.choices_if(name_divergent || (any_deleted && name_touched));
    conflict.attrs_choices = attrs.choices_if(attrs_divergent || (any_deleted && attrs_touched));
    conflict.hash_choices = hash
        .choices_if(hash_divergent || (any_deleted && hash_touched))
        .into_iter()
        .filter_map(|(h, leaves)| h.map(|h| (h, leaves)))
        .collect();

    tracing::debug!(gid = %gid, name = %composed.name, causes = %conflict.causes, "conflict");
    state.result.insert_entry(composed)?;
    state.result.register_conflict(gid, conflict)
}
