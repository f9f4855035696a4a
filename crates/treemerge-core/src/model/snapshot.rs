//! Snapshot container: one changeset's tree, keyed by identity.
//!
//! A [`Snapshot`] is an arena: entries refer to their parent by [`Gid`] and
//! never hold references to each other. Lookups are O(1). Traversals that
//! affect diagnostics go through [`Snapshot::sorted_gids`] so output is
//! reproducible.
//!
//! Invariants maintained by the mutating methods:
//! - `entries` and `deletes` are disjoint.
//! - A conflict is attached only to an identity present in `entries`, and at
//!   most once.
//!
//! Tree well-formedness (one root, every parent an existing directory, no
//! cycles) is *not* enforced on mutation: merge results pass through
//! intermediate states that violate it, and [`Snapshot::check_well_formed`]
//! reports what is left once the repair passes are done.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::conflict::Conflict;
use super::entry::Entry;
use super::gid::{ChangesetId, Gid};
use crate::error::MergeError;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// An immutable-by-convention tree state: identity → entry, plus the
/// identities deleted along this snapshot's lineage and any conflicts
/// attached by a merge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotRecord", into = "SnapshotRecord")]
pub struct Snapshot {
    /// Human-readable label (changeset id, or a description of a merge).
    pub label: String,
    /// The changeset this snapshot was loaded from. `None` for merge results.
    pub changeset: Option<ChangesetId>,
    entries: HashMap<Gid, Entry>,
    deletes: HashSet<Gid>,
    conflicts: HashMap<Gid, Conflict>,
}

impl Snapshot {
    /// An empty snapshot with a free-form label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            changeset: None,
            entries: HashMap::new(),
            deletes: HashSet::new(),
            conflicts: HashMap::new(),
        }
    }

    /// An empty snapshot of the given changeset.
    #[must_use]
    pub fn for_changeset(changeset: ChangesetId) -> Self {
        Self {
            label: changeset.to_string(),
            changeset: Some(changeset),
            ..Self::new(String::new())
        }
    }

    /// Build a snapshot from entries.
    ///
    /// # Errors
    /// Returns [`MergeError::InvariantViolation`] if two entries share a gid.
    pub fn from_entries(
        label: impl Into<String>,
        entries: impl IntoIterator<Item = Entry>,
    ) -> Result<Self, MergeError> {
        let mut snap = Self::new(label);
        for entry in entries {
            snap.insert_entry(entry)?;
        }
        Ok(snap)
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// The entry for `gid`, if present.
    #[must_use]
    pub fn entry(&self, gid: Gid) -> Option<&Entry> {
        self.entries.get(&gid)
    }

    /// `true` if `gid` has an entry.
    #[must_use]
    pub fn contains(&self, gid: Gid) -> bool {
        self.entries.contains_key(&gid)
    }

    /// `true` if `gid` is in the delete set.
    #[must_use]
    pub fn is_deleted(&self, gid: Gid) -> bool {
        self.deletes.contains(&gid)
    }

    /// The conflict attached to `gid`, if any.
    #[must_use]
    pub fn conflict(&self, gid: Gid) -> Option<&Conflict> {
        self.conflicts.get(&gid)
    }

    /// Mutable access to the conflict attached to `gid`.
    pub fn conflict_mut(&mut self, gid: Gid) -> Option<&mut Conflict> {
        self.conflicts.get_mut(&gid)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if the snapshot has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in unspecified order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Iterate deleted identities in unspecified order.
    pub fn deletes(&self) -> impl Iterator<Item = Gid> + '_ {
        self.deletes.iter().copied()
    }

    /// Iterate attached conflicts in unspecified order.
    pub fn conflicts(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.values()
    }

    /// Entry identities in ascending order.
    #[must_use]
    pub fn sorted_gids(&self) -> Vec<Gid> {
        let mut gids: Vec<Gid> = self.entries.keys().copied().collect();
        gids.sort_unstable();
        gids
    }

    /// Deleted identities in ascending order.
    #[must_use]
    pub fn sorted_deletes(&self) -> Vec<Gid> {
        let mut gids: Vec<Gid> = self.deletes.iter().copied().collect();
        gids.sort_unstable();
        gids
    }

    /// `true` if both snapshots hold the same entries and deletes, ignoring
    /// labels and conflicts.
    #[must_use]
    pub fn same_tree(&self, other: &Self) -> bool {
        self.entries == other.entries && self.deletes == other.deletes
    }

    /// The unique parentless entry, if there is exactly one.
    #[must_use]
    pub fn root(&self) -> Option<&Entry> {
        let mut roots = self.entries.values().filter(|e| e.is_root());
        let root = roots.next()?;
        if roots.next().is_some() {
            return None;
        }
        Some(root)
    }

    /// Repository path of `gid` (`"dir/file"`; the root is `""`).
    ///
    /// Returns `None` if the item or one of its ancestors is missing, or if
    /// the parent chain loops.
    #[must_use]
    pub fn path_of(&self, gid: Gid) -> Option<String> {
        let mut names = Vec::new();
        let mut current = self.entries.get(&gid)?;
        for _ in 0..=self.entries.len() {
            match current.parent {
                None => {
                    names.reverse();
                    return Some(names.join("/"));
                }
                Some(p) => {
                    names.push(current.name.as_str());
                    current = self.entries.get(&p)?;
                }
            }
        }
        None
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Add a new entry.
    ///
    /// # Errors
    /// Returns [`MergeError::InvariantViolation`] if the gid is already an
    /// entry or already deleted.
    pub fn insert_entry(&mut self, entry: Entry) -> Result<(), MergeError> {
        let gid = entry.gid;
        if self.entries.contains_key(&gid) {
            return Err(MergeError::invariant(format!(
                "{gid} inserted twice into {}",
                self.label
            )));
        }
        if self.deletes.contains(&gid) {
            return Err(MergeError::invariant(format!(
                "{gid} inserted into {} after being deleted",
                self.label
            )));
        }
        self.entries.insert(gid, entry);
        Ok(())
    }

    /// Swap an existing entry for a new value, returning the old one.
    ///
    /// # Errors
    /// Returns [`MergeError::InvariantViolation`] if the gid has no entry.
    pub fn replace_entry(&mut self, entry: Entry) -> Result<Entry, MergeError> {
        let gid = entry.gid;
        match self.entries.get_mut(&gid) {
            Some(slot) => {
                let old = std::mem::replace(slot, entry);
                if let Some(conflict) = self.conflicts.get_mut(&gid) {
                    conflict.result = slot.clone();
                }
                Ok(old)
            }
            None => Err(MergeError::invariant(format!(
                "cannot replace {gid}: not present in {}",
                self.label
            ))),
        }
    }

    /// Record `gid` as deleted.
    ///
    /// # Errors
    /// Returns [`MergeError::InvariantViolation`] if the gid is already an
    /// entry or already deleted.
    pub fn register_delete(&mut self, gid: Gid) -> Result<(), MergeError> {
        if self.entries.contains_key(&gid) {
            return Err(MergeError::invariant(format!(
                "cannot delete {gid}: it is an entry of {}",
                self.label
            )));
        }
        if !self.deletes.insert(gid) {
            return Err(MergeError::invariant(format!(
                "{gid} deleted twice in {}",
                self.label
            )));
        }
        Ok(())
    }

    /// Move a deleted identity back into the entries.
    ///
    /// # Errors
    /// Returns [`MergeError::InvariantViolation`] if the gid is not deleted.
    pub fn restore_entry(&mut self, entry: Entry) -> Result<(), MergeError> {
        if !self.deletes.remove(&entry.gid) {
            return Err(MergeError::invariant(format!(
                "cannot restore {}: not deleted in {}",
                entry.gid, self.label
            )));
        }
        self.entries.insert(entry.gid, entry);
        Ok(())
    }

    /// Attach a conflict to an entry.
    ///
    /// # Errors
    /// Returns [`MergeError::InvariantViolation`] if the gid has no entry or
    /// already has a conflict.
    pub fn register_conflict(&mut self, gid: Gid, conflict: Conflict) -> Result<(), MergeError> {
        if !self.entries.contains_key(&gid) {
            return Err(MergeError::invariant(format!(
                "conflict for {gid} has no entry in {}",
                self.label
            )));
        }
        if self.conflicts.contains_key(&gid) {
            return Err(MergeError::invariant(format!(
                "conflict for {gid} attached twice in {}",
                self.label
            )));
        }
        self.conflicts.insert(gid, conflict);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Tree shape
    // -----------------------------------------------------------------------

    /// Find parent-chain cycles reachable from `starts`.
    ///
    /// Each walk follows parents from one start with its own on-path set;
    /// identities proven acyclic by an earlier walk are never re-walked, so
    /// the total work is linear in the number of entries. Each cycle is
    /// returned once, rotated so its smallest gid comes first.
    #[must_use]
    pub fn find_cycles(&self, starts: impl IntoIterator<Item = Gid>) -> Vec<Vec<Gid>> {
        let mut settled: HashSet<Gid> = HashSet::new();
        let mut cycles: Vec<Vec<Gid>> = Vec::new();

        for start in starts {
            if settled.contains(&start) {
                continue;
            }
            let mut path: Vec<Gid> = Vec::new();
            let mut on_path: HashMap<Gid, usize> = HashMap::new();
            let mut current = Some(start);

            while let Some(gid) = current {
                if settled.contains(&gid) {
                    break;
                }
                if let Some(&pos) = on_path.get(&gid) {
                    let mut cycle = path[pos..].to_vec();
                    if let Some(min_pos) = cycle
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, g)| **g)
                        .map(|(i, _)| i)
                    {
                        cycle.rotate_left(min_pos);
                    }
                    cycles.push(cycle);
                    break;
                }
                on_path.insert(gid, path.len());
                path.push(gid);
                current = self.entries.get(&gid).and_then(|e| e.parent);
            }
            settled.extend(path);
        }
        cycles
    }

    /// Every well-formedness violation, in deterministic order.
    #[must_use]
    pub fn check_well_formed(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        let gids = self.sorted_gids();

        let roots: Vec<Gid> = gids
            .iter()
            .copied()
            .filter(|g| self.entries[g].is_root())
            .collect();
        if roots.is_empty() && !self.entries.is_empty() {
            violations.push(Violation::MissingRoot);
        }
        if roots.len() > 1 {
            violations.push(Violation::MultipleRoots { roots });
        }

        for gid in &gids {
            let entry = &self.entries[gid];
            if let Some(parent) = entry.parent {
                match self.entries.get(&parent) {
                    None if self.deletes.contains(&parent) => {
                        violations.push(Violation::DeletedParent { gid: *gid, parent });
                    }
                    None => violations.push(Violation::DanglingParent { gid: *gid, parent }),
                    Some(p) if !p.is_directory() => {
                        violations.push(Violation::ParentNotDirectory { gid: *gid, parent });
                    }
                    Some(_) => {}
                }
            }
            if entry.is_directory() && entry.hash.is_some() {
                violations.push(Violation::DirectoryWithHash { gid: *gid });
            }
            if entry.kind.has_content() && entry.hash.is_none() && !self.conflicts.contains_key(gid)
            {
                violations.push(Violation::MissingHash { gid: *gid });
            }
        }

        for members in self.find_cycles(gids.iter().copied()) {
            violations.push(Violation::Cycle { members });
        }
        violations
    }
}

// ---------------------------------------------------------------------------
// Violation
// ---------------------------------------------------------------------------

/// One way a snapshot fails to be a well-formed tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum Violation {
    /// Entries exist but none is a root.
    MissingRoot,
    /// More than one parentless entry.
    MultipleRoots {
        /// All parentless entries.
        roots: Vec<Gid>,
    },
    /// The parent is unknown to the snapshot.
    DanglingParent {
        /// The child.
        gid: Gid,
        /// The missing parent.
        parent: Gid,
    },
    /// The parent is in the delete set.
    DeletedParent {
        /// The orphaned child.
        gid: Gid,
        /// The deleted parent.
        parent: Gid,
    },
    /// The parent is not a directory.
    ParentNotDirectory {
        /// The child.
        gid: Gid,
        /// The non-directory parent.
        parent: Gid,
    },
    /// Parent links form a loop.
    Cycle {
        /// Members of the loop, smallest gid first.
        members: Vec<Gid>,
    },
    /// A directory carries a content hash.
    DirectoryWithHash {
        /// The directory.
        gid: Gid,
    },
    /// A content-bearing entry has no hash and no conflict explaining why.
    MissingHash {
        /// The entry.
        gid: Gid,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRoot => write!(f, "tree has no root"),
            Self::MultipleRoots { roots } => write!(f, "tree has {} roots", roots.len()),
            Self::DanglingParent { gid, parent } => {
                write!(f, "{gid} refers to unknown parent {parent}")
            }
            Self::DeletedParent { gid, parent } => {
                write!(f, "{gid} lives in deleted directory {parent}")
            }
            Self::ParentNotDirectory { gid, parent } => {
                write!(f, "{gid} has non-directory parent {parent}")
            }
            Self::Cycle { members } => {
                let ids: Vec<String> = members.iter().map(|g| g.short()).collect();
                write!(f, "directory cycle: {}", ids.join(" -> "))
            }
            Self::DirectoryWithHash { gid } => write!(f, "directory {gid} carries a content hash"),
            Self::MissingHash { gid } => write!(f, "{gid} has no content hash"),
        }
    }
}

// ---------------------------------------------------------------------------
// Serialization record
// ---------------------------------------------------------------------------

/// Canonical serialized form: entries and deletes sorted by gid.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct SnapshotRecord {
    label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    changeset: Option<ChangesetId>,
    entries: Vec<Entry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    deletes: Vec<Gid>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    conflicts: BTreeMap<Gid, Conflict>,
}

impl From<Snapshot> for SnapshotRecord {
    fn from(snap: Snapshot) -> Self {
        let mut entries: Vec<Entry> = snap.entries.into_values().collect();
        entries.sort_unstable_by_key(|e| e.gid);
        let mut deletes: Vec<Gid> = snap.deletes.into_iter().collect();
        deletes.sort_unstable();
        Self {
            label: snap.label,
            changeset: snap.changeset,
            entries,
            deletes,
            conflicts: snap.conflicts.into_iter().collect(),
        }
    }
}

impl TryFrom<SnapshotRecord> for Snapshot {
    type Error = MergeError;

    fn try_from(record: SnapshotRecord) -> Result<Self, Self::Error> {
        let mut snap = Self::from_entries(record.label, record.entries)?;
        snap.changeset = record.changeset;
        for gid in record.deletes {
            snap.register_delete(gid)?;
        }
        for (gid, conflict) in record.conflicts {
            snap.register_conflict(gid, conflict)?;
        }
        Ok(snap)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
