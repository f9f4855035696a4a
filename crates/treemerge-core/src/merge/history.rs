//! External history collaborators and the reduced-history computation.
//!
//! The merge engine never reads storage directly. When both leaves added
//! the same item with different values it asks two collaborators:
//!
//! - a [`SnapshotLoader`] to read a changeset's tree, and
//! - a [`HistoryService`] for the changesets where one item changed, plus
//!   the parent links needed to rebuild the history sub-graph between them.
//!
//! Both may block. The engine caches loaded snapshots for the duration of
//! one merge ([`SnapshotCache`]); callers are free to cache more.
//!
//! [`closest_candidates`] reduces a set of candidate changesets to those
//! that are not ancestors of another candidate: the nearest shared points
//! in the item's history.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::error::StoreError;
use crate::model::gid::{ChangesetId, Gid};
use crate::model::snapshot::Snapshot;

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Reads a changeset's tree from storage.
///
/// Implementations must be idempotent: loading the same id twice yields the
/// same snapshot.
pub trait SnapshotLoader {
    /// Load the tree of `changeset`.
    ///
    /// # Errors
    /// Returns [`StoreError`] if the changeset is unknown or unreadable.
    fn load(&self, changeset: &ChangesetId) -> Result<Arc<Snapshot>, StoreError>;
}

/// Answers per-item history questions over the changeset DAG.
pub trait HistoryService {
    /// Changesets reachable from `start` (inclusive) where `gid` last
    /// changed, nearest first.
    ///
    /// # Errors
    /// Returns [`StoreError`] if the history cannot be read.
    fn history(&self, gid: Gid, start: &ChangesetId) -> Result<Vec<ChangesetId>, StoreError>;

    /// Direct parents of `changeset`.
    ///
    /// # Errors
    /// Returns [`StoreError`] if the changeset is unknown.
    fn parents(&self, changeset: &ChangesetId) -> Result<Vec<ChangesetId>, StoreError>;
}

/// Collaborator used when the caller supplies none: every history is empty,
/// so independent additions of one item have no common basis.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHistory;

impl SnapshotLoader for NoHistory {
    fn load(&self, changeset: &ChangesetId) -> Result<Arc<Snapshot>, StoreError> {
        Err(StoreError::for_changeset(changeset, "no snapshot loader configured"))
    }
}

impl HistoryService for NoHistory {
    fn history(&self, _gid: Gid, _start: &ChangesetId) -> Result<Vec<ChangesetId>, StoreError> {
        Ok(Vec::new())
    }

    fn parents(&self, _changeset: &ChangesetId) -> Result<Vec<ChangesetId>, StoreError> {
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// SnapshotCache
// ---------------------------------------------------------------------------

/// Per-merge memo of loaded snapshots.
pub struct SnapshotCache<'a> {
    loader: &'a dyn SnapshotLoader,
    loaded: HashMap<ChangesetId, Arc<Snapshot>>,
}

impl<'a> SnapshotCache<'a> {
    /// An empty cache over `loader`.
    #[must_use]
    pub fn new(loader: &'a dyn SnapshotLoader) -> Self {
        Self {
            loader,
            loaded: HashMap::new(),
        }
    }

    /// Load `changeset`, reusing an earlier load.
    ///
    /// # Errors
    /// Propagates the loader's error.
    pub fn get(&mut self, changeset: &ChangesetId) -> Result<Arc<Snapshot>, StoreError> {
        if let Some(snap) = self.loaded.get(changeset) {
            return Ok(Arc::clone(snap));
        }
        let snap = self.loader.load(changeset)?;
        tracing::trace!(changeset = %changeset, entries = snap.len(), "loaded snapshot");
        self.loaded.insert(changeset.clone(), Arc::clone(&snap));
        Ok(snap)
    }

    /// Number of distinct snapshots loaded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    /// `true` if nothing has been loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Candidate reduction
// ---------------------------------------------------------------------------

/// Intersection of two history lists, in `first`'s order.
#[must_use]
pub fn intersect(first: &[ChangesetId], second: &[ChangesetId]) -> Vec<ChangesetId> {
    let in_second: HashSet<&ChangesetId> = second.iter().collect();
    let mut seen = HashSet::new();
    first
        .iter()
        .filter(|cs| in_second.contains(cs) && seen.insert(*cs))
        .cloned()
        .collect()
}

/// The candidates that are not ancestors of any other candidate.
///
/// Walks the DAG backwards from every candidate's parents (breadth-first,
/// with one shared visited set per candidate) and drops every candidate
/// reached that way. Output keeps the input order.
///
/// # Errors
/// Propagates the history service's error.
pub fn closest_candidates(
    history: &dyn HistoryService,
    candidates: &[ChangesetId],
) -> Result<Vec<ChangesetId>, StoreError> {
    if candidates.len() <= 1 {
        return Ok(candidates.to_vec());
    }

    let candidate_set: BTreeSet<&ChangesetId> = candidates.iter().collect();
    let mut parents_memo: HashMap<ChangesetId, Vec<ChangesetId>> = HashMap::new();
    let mut dominated: HashSet<ChangesetId> = HashSet::new();

    for candidate in candidates {
        if dominated.len() + 1 >= candidate_set.len() {
            break;
        }
        // Whatever a dominated candidate reaches, its dominator reaches too.
        if dominated.contains(candidate) {
            continue;
        }
        let mut visited: HashSet<ChangesetId> = HashSet::new();
        let mut queue: VecDeque<ChangesetId> = VecDeque::new();
        queue.extend(parents_of(history, &mut parents_memo, candidate)?);

        while let Some(cs) = queue.pop_front() {
            if !visited.insert(cs.clone()) {
                continue;
            }
            if candidate_set.contains(&cs) {
                dominated.insert(cs.clone());
            }
            for parent in parents_of(history, &mut parents_memo, &cs)? {
                if !visited.contains(&parent) {
                    queue.push_back(parent);
                }
            }
        }
    }

    Ok(candidates
        .iter()
        .filter(|cs| !dominated.contains(*cs))
        .cloned()
        .collect())
}

fn parents_of(
    history: &dyn HistoryService,
    memo: &mut HashMap<ChangesetId, Vec<ChangesetId>>,
    cs: &ChangesetId,
) -> Result<Vec<ChangesetId>, StoreError> {
    if let Some(p) = memo.get(cs) {
        return Ok(p.clone());
    }
    let parents = history.parents(cs)?;
    memo.insert(cs.clone(), parents.clone());
    Ok(parents)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
