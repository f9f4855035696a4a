//! In-memory changeset DAG.
//!
//! [`MemoryRepo`] stores full snapshots per changeset together with their
//! parent links, and answers the two collaborator traits the merge engine
//! consumes. It backs the CLI fixtures, the integration tests and the
//! benchmarks; a real store would implement the same traits over its own
//! storage.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use crate::error::StoreError;
use crate::merge::history::{HistoryService, SnapshotLoader, closest_candidates};
use crate::model::gid::{ChangesetId, Gid};
use crate::model::snapshot::Snapshot;

// ---------------------------------------------------------------------------
// RepoError
// ---------------------------------------------------------------------------

/// Errors from building or querying a [`MemoryRepo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    /// A changeset with this id already exists.
    Duplicate(ChangesetId),
    /// A changeset named a parent the repository does not hold.
    UnknownParent {
        changeset: ChangesetId,
        parent: ChangesetId,
    },
    /// No changeset with this id.
    Unknown(ChangesetId),
}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate(id) => write!(f, "changeset {id} already exists"),
            Self::UnknownParent { changeset, parent } => {
                write!(f, "changeset {changeset} names unknown parent {parent}")
            }
            Self::Unknown(id) => write!(f, "unknown changeset {id}"),
        }
    }
}

impl std::error::Error for RepoError {}

impl From<RepoError> for StoreError {
    fn from(e: RepoError) -> Self {
        match &e {
            RepoError::Duplicate(id) | RepoError::Unknown(id) => {
                Self::for_changeset(id, e.to_string())
            }
            RepoError::UnknownParent { changeset, .. } => {
                Self::for_changeset(changeset, e.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryRepo
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Node {
    parents: Vec<ChangesetId>,
    snapshot: Arc<Snapshot>,
}

/// A changeset DAG held in memory.
#[derive(Debug, Default)]
pub struct MemoryRepo {
    nodes: HashMap<ChangesetId, Node>,
    order: Vec<ChangesetId>,
}

impl MemoryRepo {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a changeset on top of `parents`.
    ///
    /// The snapshot's `changeset` field is set to `id`; an empty label is
    /// replaced by the id.
    ///
    /// # Errors
    /// Returns [`RepoError::Duplicate`] if `id` exists, or
    /// [`RepoError::UnknownParent`] if a parent does not.
    pub fn add_changeset(
        &mut self,
        id: ChangesetId,
        parents: Vec<ChangesetId>,
        mut snapshot: Snapshot,
    ) -> Result<(), RepoError> {
        if self.nodes.contains_key(&id) {
            return Err(RepoError::Duplicate(id));
        }
        if let Some(parent) = parents.iter().find(|p| !self.nodes.contains_key(*p)) {
            return Err(RepoError::UnknownParent {
                changeset: id,
                parent: parent.clone(),
            });
        }
        if snapshot.label.is_empty() {
            snapshot.label = id.to_string();
        }
        snapshot.changeset = Some(id.clone());
        self.order.push(id.clone());
        self.nodes.insert(
            id,
            Node {
                parents,
                snapshot: Arc::new(snapshot),
            },
        );
        Ok(())
    }

    /// Number of changesets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Changeset ids in insertion order.
    pub fn changesets(&self) -> impl Iterator<Item = &ChangesetId> {
        self.order.iter()
    }

    /// `true` if `id` is in the repository.
    #[must_use]
    pub fn contains(&self, id: &ChangesetId) -> bool {
        self.nodes.contains_key(id)
    }

    /// The tree of `id`.
    ///
    /// # Errors
    /// Returns [`RepoError::Unknown`] for an unknown id.
    pub fn snapshot(&self, id: &ChangesetId) -> Result<Arc<Snapshot>, RepoError> {
        self.node(id).map(|n| Arc::clone(&n.snapshot))
    }

    /// Direct parents of `id`.
    ///
    /// # Errors
    /// Returns [`RepoError::Unknown`] for an unknown id.
    pub fn parents_of(&self, id: &ChangesetId) -> Result<&[ChangesetId], RepoError> {
        self.node(id).map(|n| n.parents.as_slice())
    }

    /// `true` if `ancestor` is `descendant` or reachable from it through
    /// parent links.
    ///
    /// # Errors
    /// Returns [`RepoError::Unknown`] if either id is unknown.
    pub fn is_ancestor(
        &self,
        ancestor: &ChangesetId,
        descendant: &ChangesetId,
    ) -> Result<bool, RepoError> {
        self.node(ancestor)?;
        Ok(self.ancestry(descendant)?.contains(ancestor))
    }

    /// The closest common ancestors of `a` and `b`: changesets reachable
    /// from both that are not an ancestor of another such changeset.
    /// Ordered by insertion.
    ///
    /// # Errors
    /// Returns [`RepoError::Unknown`] if either id is unknown.
    pub fn common_ancestors(
        &self,
        a: &ChangesetId,
        b: &ChangesetId,
    ) -> Result<Vec<ChangesetId>, RepoError> {
        let from_a = self.ancestry(a)?;
        let from_b = self.ancestry(b)?;
        let common: Vec<ChangesetId> = self
            .order
            .iter()
            .filter(|cs| from_a.contains(*cs) && from_b.contains(*cs))
            .cloned()
            .collect();
        closest_candidates(self, &common).map_err(|e| match e.changeset {
            Some(cs) => RepoError::Unknown(cs),
            None => RepoError::Unknown(a.clone()),
        })
    }

    fn node(&self, id: &ChangesetId) -> Result<&Node, RepoError> {
        self.nodes.get(id).ok_or_else(|| RepoError::Unknown(id.clone()))
    }

    /// `start` and everything reachable from it.
    fn ancestry(&self, start: &ChangesetId) -> Result<HashSet<&ChangesetId>, RepoError> {
        let mut seen: HashSet<&ChangesetId> = HashSet::new();
        let mut queue: VecDeque<&ChangesetId> = VecDeque::new();
        let start = self
            .nodes
            .get_key_value(start)
            .ok_or_else(|| RepoError::Unknown(start.clone()))?
            .0;
        queue.push_back(start);
        while let Some(cs) = queue.pop_front() {
            if !seen.insert(cs) {
                continue;
            }
            for parent in &self.node(cs)?.parents {
                queue.push_back(parent);
            }
        }
        Ok(seen)
    }
}

impl SnapshotLoader for MemoryRepo {
    fn load(&self, changeset: &ChangesetId) -> Result<Arc<Snapshot>, StoreError> {
        Ok(self.snapshot(changeset)?)
    }
}

impl HistoryService for MemoryRepo {
    /// Breadth-first from `start`; a changeset is listed when it holds the
    /// item in a state none of its parents hold.
    fn history(&self, gid: Gid, start: &ChangesetId) -> Result<Vec<ChangesetId>, StoreError> {
        let mut out = Vec::new();
        let mut seen: HashSet<&ChangesetId> = HashSet::new();
        let mut queue: VecDeque<&ChangesetId> = VecDeque::new();
        let start = self
            .nodes
            .get_key_value(start)
            .ok_or_else(|| RepoError::Unknown(start.clone()))?
            .0;
        queue.push_back(start);

        while let Some(cs) = queue.pop_front() {
            if !seen.insert(cs) {
                continue;
            }
            let node = self.node(cs)?;
            if let Some(entry) = node.snapshot.entry(gid) {
                let mut changed_here = true;
                for parent in &node.parents {
                    if self.node(parent)?.snapshot.entry(gid) == Some(entry) {
                        changed_here = false;
                        break;
                    }
                }
                if changed_here {
                    out.push(cs.clone());
                }
            }
            for parent in &node.parents {
                if !seen.contains(parent) {
                    queue.push_back(parent);
                }
            }
        }
        Ok(out)
    }

    fn parents(&self, changeset: &ChangesetId) -> Result<Vec<ChangesetId>, StoreError> {
        Ok(self.parents_of(changeset)?.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::all, clippy::pedantic, clippy::nursery)]
mod tests {
    use super::*;
    use crate::model::entry::Entry;
    use crate::model::gid::ContentHash;

    fn cs(s: &str) -> ChangesetId {
        ChangesetId::new(s).unwrap()
    }

    const ROOT: Gid = Gid::new(1);
    const F: Gid = Gid::new(2);

    fn with_file(hash: Option<&str>) -> Snapshot {
        let mut entries = vec![Entry::root(ROOT)];
        if let Some(h) = hash {
            entries.push(Entry::file(F, ROOT, "f", ContentHash::new(h).unwrap()));
        }
        Snapshot::from_entries("", entries).unwrap()
    }

    /// c0 (no f) ← c1 (f=aa) ← c2 (f=bb) ← c4 (f=bb)
    ///                ↖ c3 (f=cc)
    fn repo() -> MemoryRepo {
        let mut r = MemoryRepo::new();
        r.add_changeset(cs("c0"), vec![], with_file(None)).unwrap();
        r.add_changeset(cs("c1"), vec![cs("c0")], with_file(Some("aaaaaaaa"))).unwrap();
        r.add_changeset(cs("c2"), vec![cs("c1")], with_file(Some("bbbbbbbb"))).unwrap();
        r.add_changeset(cs("c3"), vec![cs("c1")], with_file(Some("cccccccc"))).unwrap();
        r.add_changeset(cs("c4"), vec![cs("c2")], with_file(Some("bbbbbbbb"))).unwrap();
        r
    }

    #[test]
    fn added_snapshot_is_stamped_with_its_id() {
        let r = repo();
        let snap = r.snapshot(&cs("c2")).unwrap();
        assert_eq!(snap.changeset, Some(cs("c2")));
        assert_eq!(snap.label, "c2");
        assert_eq!(r.len(), 5);
    }

    #[test]
    fn duplicate_and_dangling_parents_are_rejected() {
        let mut r = repo();
        assert_eq!(
            r.add_changeset(cs("c1"), vec![], with_file(None)),
            Err(RepoError::Duplicate(cs("c1")))
        );
        assert!(matches!(
            r.add_changeset(cs("c9"), vec![cs("nope")], with_file(None)),
            Err(RepoError::UnknownParent { .. })
        ));
    }

    #[test]
    fn ancestry_queries() {
        let r = repo();
        assert!(r.is_ancestor(&cs("c1"), &cs("c4")).unwrap());
        assert!(r.is_ancestor(&cs("c4"), &cs("c4")).unwrap());
        assert!(!r.is_ancestor(&cs("c3"), &cs("c4")).unwrap());
        assert_eq!(r.common_ancestors(&cs("c4"), &cs("c3")).unwrap(), vec![cs("c1")]);
        assert_eq!(r.common_ancestors(&cs("c2"), &cs("c4")).unwrap(), vec![cs("c2")]);
    }

    #[test]
    fn history_lists_changes_nearest_first() {
        let r = repo();
        // c4 repeats c2's version, so it is not a change point.
        assert_eq!(r.history(F, &cs("c4")).unwrap(), vec![cs("c2"), cs("c1")]);
        assert_eq!(r.history(F, &cs("c3")).unwrap(), vec![cs("c3"), cs("c1")]);
        assert!(r.history(F, &cs("c0")).unwrap().is_empty());
        assert_eq!(r.history(ROOT, &cs("c4")).unwrap(), vec![cs("c0")]);
    }

    #[test]
    fn unknown_changeset_is_a_store_error() {
        let r = repo();
        let err = r.load(&cs("zz")).unwrap_err();
        assert_eq!(err.changeset, Some(cs("zz")));
        assert!(r.history(F, &cs("zz")).is_err());
    }
}
