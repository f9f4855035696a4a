//! Merge engine: drives one ancestor + two-leaf merge.
//!
//! Phases, in order:
//!
//! 1. every ancestor entry, by ascending gid: quick scan, else the conflict
//!    builder;
//! 2. entries the ancestor walk never visited (additions), per leaf;
//! 3. lineage deletes carried into the result;
//! 4. orphan repair;
//! 5. cycle repair (which re-runs orphan repair on what it moves);
//! 6. uncontrolled-orphan check against caller-supplied found items;
//! 7. entry-name collision report;
//! 8. optional well-formedness check.
//!
//! All transient bookkeeping lives in [`MergeState`] and is dropped when
//! the call returns. Inputs are never mutated.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::MergeError;
use crate::model::conflict::{Conflict, ConflictCause, Leaf};
use crate::model::entry::Entry;
use crate::model::gid::Gid;
use crate::model::snapshot::Snapshot;

use super::collision::{EntrynameCollision, find_collisions};
use super::history::{HistoryService, NoHistory, SnapshotCache, SnapshotLoader};
use super::{addition, builder, cycle, orphan, quick_scan};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// What kind of operation the merge serves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// A merge commit: items without a common basis abort the merge.
    #[default]
    Merge,
    /// A working-copy update: items without a common basis become update
    /// conflicts and the baseline version is kept.
    Update,
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge => write!(f, "merge"),
            Self::Update => write!(f, "update"),
        }
    }
}

/// An untracked working-copy item living in a controlled directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundItem {
    /// File name of the untracked item.
    pub name: String,
    /// Controlled directory containing it.
    pub parent: Gid,
}

/// Caller-tunable merge behaviour.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeOptions {
    pub mode: MergeMode,
    /// Untracked items to protect from directory deletes.
    pub found: Vec<FoundItem>,
    /// Run the well-formedness check on the result before returning.
    pub verify_result: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            mode: MergeMode::Merge,
            found: Vec::new(),
            verify_result: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// An item kept at its baseline version because, in update mode, the two
/// leaves' versions had no common basis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateConflict {
    pub gid: Gid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub reason: String,
}

/// Counters collected during one merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Ancestor entries settled by the quick scan.
    pub quick_scan: usize,
    /// Entries that needed the conflict builder.
    pub hard_way: usize,
    /// Entries present in exactly one leaf and absent from the ancestor.
    pub clean_additions: usize,
    /// Entries both leaves added identically.
    pub identical_additions: usize,
    /// Additions resolved through a per-item ancestor.
    pub per_item_ancestors: usize,
    /// Deleted directories brought back for their children.
    pub orphans_restored: usize,
    /// Path cycles broken.
    pub cycles_broken: usize,
    /// Snapshots loaded from the history while searching ancestors.
    pub snapshots_loaded: usize,
}

/// Everything a merge produces.
#[derive(Clone, Debug, Serialize)]
pub struct MergeOutcome {
    /// The merged tree. Its conflict index mirrors [`Self::conflicts`].
    pub result: Snapshot,
    /// Conflicts by identity.
    pub conflicts: BTreeMap<Gid, Conflict>,
    /// Items without a common basis (update mode only).
    pub update_conflicts: Vec<UpdateConflict>,
    /// Sibling entries sharing one name.
    pub collisions: Vec<EntrynameCollision>,
    pub stats: MergeStats,
}

impl MergeOutcome {
    /// `true` if nothing needs a human or a content merge.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty() && self.update_conflicts.is_empty() && self.collisions.is_empty()
    }

    /// The conflict attached to `gid`, if any.
    #[must_use]
    pub fn conflict(&self, gid: Gid) -> Option<&Conflict> {
        self.conflicts.get(&gid)
    }
}

// ---------------------------------------------------------------------------
// MergeState
// ---------------------------------------------------------------------------

/// Transient state of one merge.
pub(crate) struct MergeState<'a> {
    pub(crate) ancestor: &'a Snapshot,
    pub(crate) leaves: [&'a Snapshot; 2],
    pub(crate) result: Snapshot,
    visited: [HashSet<Gid>; 2],
    /// Per-item ancestors found for additions, by identity.
    item_ancestors: HashMap<Gid, Entry>,
    pub(crate) options: &'a MergeOptions,
    pub(crate) history: &'a dyn HistoryService,
    pub(crate) cache: SnapshotCache<'a>,
    pub(crate) stats: MergeStats,
    pub(crate) update_conflicts: Vec<UpdateConflict>,
}

impl<'a> MergeState<'a> {
    pub(crate) fn new(
        ancestor: &'a Snapshot,
        leaves: [&'a Snapshot; 2],
        options: &'a MergeOptions,
        history: &'a dyn HistoryService,
        loader: &'a dyn SnapshotLoader,
    ) -> Self {
        let label = format!("merge({},{})", leaves[0].label, leaves[1].label);
        Self {
            ancestor,
            leaves,
            result: Snapshot::new(label),
            visited: [HashSet::new(), HashSet::new()],
            item_ancestors: HashMap::new(),
            options,
            history,
            cache: SnapshotCache::new(loader),
            stats: MergeStats::default(),
            update_conflicts: Vec::new(),
        }
    }

    pub(crate) const fn leaf(&self, leaf: Leaf) -> &'a Snapshot {
        self.leaves[leaf.index()]
    }

    pub(crate) fn leaf_entry(&self, leaf: Leaf, gid: Gid) -> Option<&'a Entry> {
        self.leaf(leaf).entry(gid)
    }

    pub(crate) fn leaf_conflict(&self, leaf: Leaf, gid: Gid) -> Option<&'a Conflict> {
        self.leaf(leaf).conflict(gid)
    }

    pub(crate) fn mark_visited(&mut self, leaf: Leaf, gid: Gid) {
        self.visited[leaf.index()].insert(gid);
    }

    pub(crate) fn is_visited(&self, leaf: Leaf, gid: Gid) -> bool {
        self.visited[leaf.index()].contains(&gid)
    }

    /// Settle one identity against the given ancestor entry: quick scan
    /// first, conflict builder when the scan declines.
    pub(crate) fn resolve_against(&mut self, ancestor: &Entry) -> Result<(), MergeError> {
        for leaf in Leaf::ALL {
            self.mark_visited(leaf, ancestor.gid);
        }
        if quick_scan::try_resolve(self, ancestor)? {
            self.stats.quick_scan += 1;
        } else {
            builder::build(self, ancestor)?;
            self.stats.hard_way += 1;
        }
        Ok(())
    }

    /// Settle an addition against the per-item ancestor found for it. The
    /// entry stands in for the ancestor for every later conflict on `gid`.
    pub(crate) fn resolve_against_item(&mut self, ancestor: Entry) -> Result<(), MergeError> {
        self.item_ancestors.insert(ancestor.gid, ancestor.clone());
        self.resolve_against(&ancestor)
    }

    /// The ancestor version of `gid`: its per-item ancestor if it has one,
    /// else the merge ancestor's entry.
    pub(crate) fn ancestor_entry(&self, gid: Gid) -> Option<&Entry> {
        self.item_ancestors
            .get(&gid)
            .or_else(|| self.ancestor.entry(gid))
    }

    /// The best known version of `gid` outside the result: baseline, then
    /// other, then ancestor.
    pub(crate) fn known_entry(&self, gid: Gid) -> Option<&'a Entry> {
        self.leaf_entry(Leaf::Baseline, gid)
            .or_else(|| self.leaf_entry(Leaf::Other, gid))
            .or_else(|| self.ancestor.entry(gid))
    }

    /// Add `cause` to the conflict on `gid`, creating the conflict if the
    /// entry has none.
    pub(crate) fn add_cause(
        &mut self,
        gid: Gid,
        cause: ConflictCause,
    ) -> Result<&mut Conflict, MergeError> {
        if self.result.conflict(gid).is_none() {
            let Some(entry) = self.result.entry(gid).cloned() else {
                return Err(MergeError::invariant(format!(
                    "cannot flag {gid}: not in the result"
                )));
            };
            let mut conflict = Conflict::new(
                self.ancestor_entry(gid).cloned(),
                self.leaf_entry(Leaf::Baseline, gid).cloned(),
                entry,
            );
            conflict.deleted_by = Leaf::ALL
                .into_iter()
                .filter(|leaf| self.leaf_entry(*leaf, gid).is_none())
                .collect();
            self.result.register_conflict(gid, conflict)?;
        }
        let conflict = self
            .result
            .conflict_mut(gid)
            .ok_or_else(|| MergeError::invariant(format!("conflict for {gid} vanished")))?;
        conflict.causes.insert(cause);
        Ok(conflict)
    }

    /// Record every identity the inputs' lineage deleted and the result
    /// neither holds nor deleted yet.
    fn carry_lineage_deletes(&mut self) -> Result<(), MergeError> {
        let mut known: Vec<Gid> = self
            .ancestor
            .deletes()
            .chain(self.leaves[0].deletes())
            .chain(self.leaves[1].deletes())
            .collect();
        known.sort_unstable();
        known.dedup();
        for gid in known {
            if !self.result.contains(gid) && !self.result.is_deleted(gid) {
                self.result.register_delete(gid)?;
            }
        }
        Ok(())
    }

    fn check_found_items(&self) -> Result<(), MergeError> {
        for item in &self.options.found {
            if self.result.is_deleted(item.parent) {
                return Err(MergeError::UncontrolledOrphan {
                    name: item.name.clone(),
                    parent: item.parent,
                });
            }
            if !self.result.contains(item.parent) {
                return Err(MergeError::invariant(format!(
                    "found item {:?} names unknown parent {}",
                    item.name, item.parent
                )));
            }
        }
        Ok(())
    }

    fn verify(&self) -> Result<(), MergeError> {
        let violations = self.result.check_well_formed();
        if violations.is_empty() {
            return Ok(());
        }
        let detail = violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(MergeError::invariant(format!("merge result is malformed: {detail}")))
    }

    fn into_outcome(mut self, collisions: Vec<EntrynameCollision>) -> MergeOutcome {
        self.stats.snapshots_loaded = self.cache.len();
        let conflicts = self
            .result
            .conflicts()
            .map(|c| (c.gid(), c.clone()))
            .collect();
        MergeOutcome {
            result: self.result,
            conflicts,
            update_conflicts: self.update_conflicts,
            collisions,
            stats: self.stats,
        }
    }
}

// ---------------------------------------------------------------------------
// TreeMerge
// ---------------------------------------------------------------------------

/// Builder for one merge.
///
/// ```
/// use treemerge_core::merge::TreeMerge;
/// use treemerge_core::model::{Entry, Gid, Snapshot};
///
/// let root = Entry::root(Gid::new(1));
/// let tree = Snapshot::from_entries("base", [root]).unwrap();
/// let outcome = TreeMerge::new(&tree, &[&tree, &tree]).run().unwrap();
/// assert!(outcome.is_clean());
/// assert!(outcome.result.same_tree(&tree));
/// ```
pub struct TreeMerge<'a> {
    ancestor: &'a Snapshot,
    leaves: Vec<&'a Snapshot>,
    history: &'a dyn HistoryService,
    loader: &'a dyn SnapshotLoader,
    options: MergeOptions,
}

impl<'a> TreeMerge<'a> {
    /// Merge `leaves` (baseline first) against `ancestor`.
    #[must_use]
    pub fn new(ancestor: &'a Snapshot, leaves: &[&'a Snapshot]) -> Self {
        Self {
            ancestor,
            leaves: leaves.to_vec(),
            history: &NoHistory,
            loader: &NoHistory,
            options: MergeOptions::default(),
        }
    }

    /// Use `history` for per-item ancestor searches.
    #[must_use]
    pub fn history(mut self, history: &'a dyn HistoryService) -> Self {
        self.history = history;
        self
    }

    /// Use `loader` to read candidate ancestor snapshots.
    #[must_use]
    pub fn loader(mut self, loader: &'a dyn SnapshotLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Use one store for both collaborators.
    #[must_use]
    pub fn store<S: HistoryService + SnapshotLoader>(self, store: &'a S) -> Self {
        self.history(store).loader(store)
    }

    #[must_use]
    pub fn options(mut self, options: MergeOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the merge.
    ///
    /// # Errors
    /// - [`MergeError::UnsupportedTopology`] unless exactly two leaves were given.
    /// - [`MergeError::NoCommonBasis`] when both leaves added one item
    ///   differently without shared history (merge mode).
    /// - [`MergeError::UncontrolledOrphan`] when a found item would lose
    ///   its directory.
    /// - [`MergeError::Store`] when a collaborator fails.
    /// - [`MergeError::InvariantViolation`] on malformed input or result.
    #[instrument(skip_all, fields(ancestor = %self.ancestor.label, mode = %self.options.mode))]
    pub fn run(self) -> Result<MergeOutcome, MergeError> {
        let &[baseline, other] = self.leaves.as_slice() else {
            return Err(MergeError::UnsupportedTopology {
                leaves: self.leaves.len(),
            });
        };
        let mut state = MergeState::new(
            self.ancestor,
            [baseline, other],
            &self.options,
            self.history,
            self.loader,
        );

        for gid in self.ancestor.sorted_gids() {
            if let Some(entry) = self.ancestor.entry(gid) {
                state.resolve_against(entry)?;
            }
        }
        tracing::debug!(
            quick_scan = state.stats.quick_scan,
            hard_way = state.stats.hard_way,
            "ancestor walk done"
        );

        addition::resolve_additions(&mut state)?;
        state.carry_lineage_deletes()?;

        let all = state.result.sorted_gids();
        orphan::repair_orphans(&mut state, all)?;
        cycle::repair_cycles(&mut state)?;
        state.check_found_items()?;

        let collisions = find_collisions(&state.result);
        for collision in &collisions {
            tracing::debug!(
                parent = %collision.parent,
                name = %collision.name,
                "entry name collision"
            );
        }

        if self.options.verify_result {
            state.verify()?;
        }

        let outcome = state.into_outcome(collisions);
        let stats = &outcome.stats;
        tracing::info!(
            entries = outcome.result.len(),
            conflicts = outcome.conflicts.len(),
            quick_scan = stats.quick_scan,
            hard_way = stats.hard_way,
            additions = stats.clean_additions + stats.identical_additions,
            per_item_ancestors = stats.per_item_ancestors,
            orphans_restored = stats.orphans_restored,
            cycles_broken = stats.cycles_broken,
            "merge complete"
        );
        Ok(outcome)
    }
}

/// Merge two leaves against their ancestor with default options and no
/// history collaborators.
///
/// # Errors
/// See [`TreeMerge::run`].
pub fn compute(
    ancestor: &Snapshot,
    baseline: &Snapshot,
    other: &Snapshot,
) -> Result<MergeOutcome, MergeError> {
    TreeMerge::new(ancestor, &[baseline, other]).run()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
