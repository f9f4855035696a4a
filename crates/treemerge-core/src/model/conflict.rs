//! Structured conflict model: causes, per-field choices, and cycle hints.
//!
//! A [`Conflict`] is attached to at most one entry of a merge result. It
//! records *why* the entry could not be settled automatically (a set of
//! [`ConflictCause`]s, several of which can co-occur) and, per divergent
//! field, every value a leaf produced together with the leaf(s) that
//! produced it. Downstream tools present those choices to a resolver.
//!
//! # Cause families
//!
//! | Family | Meaning |
//! |--------|---------|
//! | `Divergent*` | Both leaves changed a field to different values |
//! | `DeleteVs*` | One leaf deleted the item, another changed a field |
//! | [`ConflictCause::DeleteCausedOrphan`] | A deleted directory was restored because something still lives in it |
//! | [`ConflictCause::MovesCausedPathCycle`] | Directory moves would have made a directory its own ancestor |
//! | [`ConflictCause::UnresolvedNested`] | A leaf still carried a conflict from an earlier merge |
//!
//! # Serialization
//!
//! ```json
//! {
//!   "causes": ["divergent_rename"],
//!   "result": { "gid": "…", "parent": "…", "name": "x", "kind": "file", "hash": "…", "attrs": 0 },
//!   "name_choices": { "y0": ["baseline"], "y1": ["other"] }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::entry::{Entry, EntryKind};
use super::gid::{ContentHash, Gid};

// ---------------------------------------------------------------------------
// Leaf
// ---------------------------------------------------------------------------

/// One of the two leaf snapshots of a merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leaf {
    /// Leaf 0: "mine". Seeds composed entries and wins layout repairs.
    Baseline,
    /// Leaf 1: "theirs".
    Other,
}

impl Leaf {
    /// Both leaves, in index order.
    pub const ALL: [Self; 2] = [Self::Baseline, Self::Other];

    /// Position of this leaf in the input slice.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Baseline => 0,
            Self::Other => 1,
        }
    }

    /// The other leaf.
    #[must_use]
    pub const fn peer(self) -> Self {
        match self {
            Self::Baseline => Self::Other,
            Self::Other => Self::Baseline,
        }
    }
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Baseline => write!(f, "baseline"),
            Self::Other => write!(f, "other"),
        }
    }
}

// ---------------------------------------------------------------------------
// ConflictCause
// ---------------------------------------------------------------------------

/// One reason an entry could not be merged automatically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictCause {
    /// Leaves moved the item to different directories.
    DivergentMove,
    /// Leaves renamed the item to different names.
    DivergentRename,
    /// Leaves set different attribute bits.
    DivergentAttrs,
    /// Leaves edited file content differently; an external content merge
    /// must produce the hash.
    DivergentFileEditPending,
    /// Leaves retargeted a symlink differently. No automatic fallback.
    DivergentSymlinkEdit,
    /// Leaves pointed a submodule at different references. No automatic
    /// fallback.
    DivergentSubmoduleEdit,
    /// One leaf deleted the item, another moved it.
    DeleteVsMove,
    /// One leaf deleted the item, another renamed it.
    DeleteVsRename,
    /// One leaf deleted the item, another changed its attributes.
    DeleteVsAttrs,
    /// One leaf deleted the file, another edited it.
    DeleteVsFileEdit,
    /// One leaf deleted the symlink, another retargeted it.
    DeleteVsSymlinkEdit,
    /// One leaf deleted the submodule, another changed its reference.
    DeleteVsSubmoduleEdit,
    /// The directory was deleted but restored because the merge kept
    /// something inside it.
    DeleteCausedOrphan,
    /// The directory's move was undone to break a path cycle.
    MovesCausedPathCycle,
    /// A leaf entry already carried an unresolved conflict.
    UnresolvedNested,
}

impl ConflictCause {
    /// The divergence cause for a content edit of the given kind.
    #[must_use]
    pub const fn divergent_edit(kind: EntryKind) -> Option<Self> {
        match kind {
            EntryKind::File => Some(Self::DivergentFileEditPending),
            EntryKind::Symlink => Some(Self::DivergentSymlinkEdit),
            EntryKind::Submodule => Some(Self::DivergentSubmoduleEdit),
            EntryKind::Directory => None,
        }
    }

    /// The delete-vs-edit cause for a content edit of the given kind.
    #[must_use]
    pub const fn delete_vs_edit(kind: EntryKind) -> Option<Self> {
        match kind {
            EntryKind::File => Some(Self::DeleteVsFileEdit),
            EntryKind::Symlink => Some(Self::DeleteVsSymlinkEdit),
            EntryKind::Submodule => Some(Self::DeleteVsSubmoduleEdit),
            EntryKind::Directory => None,
        }
    }

    /// `true` for causes an automated content merge can settle.
    #[must_use]
    pub const fn is_auto_mergeable(self) -> bool {
        matches!(self, Self::DivergentFileEditPending)
    }
}

impl fmt::Display for ConflictCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DivergentMove => "divergent move",
            Self::DivergentRename => "divergent rename",
            Self::DivergentAttrs => "divergent attributes",
            Self::DivergentFileEditPending => "divergent file edit (content merge pending)",
            Self::DivergentSymlinkEdit => "divergent symlink target",
            Self::DivergentSubmoduleEdit => "divergent submodule reference",
            Self::DeleteVsMove => "delete vs move",
            Self::DeleteVsRename => "delete vs rename",
            Self::DeleteVsAttrs => "delete vs attribute change",
            Self::DeleteVsFileEdit => "delete vs file edit",
            Self::DeleteVsSymlinkEdit => "delete vs symlink edit",
            Self::DeleteVsSubmoduleEdit => "delete vs submodule edit",
            Self::DeleteCausedOrphan => "delete would orphan entries",
            Self::MovesCausedPathCycle => "moves would create a path cycle",
            Self::UnresolvedNested => "unresolved conflict from an earlier merge",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Causes
// ---------------------------------------------------------------------------

/// The set of causes attached to one conflict.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Causes(BTreeSet<ConflictCause>);

impl Causes {
    /// An empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Add a cause. Returns `true` if it was not present.
    pub fn insert(&mut self, cause: ConflictCause) -> bool {
        self.0.insert(cause)
    }

    /// `true` if `cause` is present.
    #[must_use]
    pub fn contains(&self, cause: ConflictCause) -> bool {
        self.0.contains(&cause)
    }

    /// `true` if no cause is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of causes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate causes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = ConflictCause> + '_ {
        self.0.iter().copied()
    }

    /// Union `other` into `self`.
    pub fn extend(&mut self, other: &Self) {
        self.0.extend(other.0.iter().copied());
    }
}

impl FromIterator<ConflictCause> for Causes {
    fn from_iter<I: IntoIterator<Item = ConflictCause>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Causes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Conflict
// ---------------------------------------------------------------------------

/// Distinct values a field was changed to, each with the leaves that chose it.
pub type ValueChoices<T> = BTreeMap<T, Vec<Leaf>>;

/// Everything the merge knows about one unsettled entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// Entry in the ancestor (or per-item ancestor), if the item existed there.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancestor: Option<Entry>,
    /// Entry in the baseline leaf, if present there.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Entry>,
    /// The composed entry placed in the result.
    pub result: Entry,
    /// Why the entry is in conflict.
    pub causes: Causes,
    /// Leaves that deleted the item.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deleted_by: Vec<Leaf>,
    /// Parent directories chosen by leaves that moved the item.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parent_choices: ValueChoices<Gid>,
    /// Names chosen by leaves that renamed the item.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub name_choices: ValueChoices<String>,
    /// Attribute bits chosen by leaves that changed them.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs_choices: ValueChoices<u64>,
    /// Content hashes chosen by leaves that edited the content.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hash_choices: ValueChoices<ContentHash>,
    /// Human-readable description of the nesting a cycle made impossible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_hint: Option<String>,
    /// Other directories involved in the same path cycle.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cycle_members: Vec<Gid>,
}

impl Conflict {
    /// A conflict with no causes yet, for the given composed entry.
    #[must_use]
    pub fn new(ancestor: Option<Entry>, baseline: Option<Entry>, result: Entry) -> Self {
        Self {
            ancestor,
            baseline,
            result,
            causes: Causes::new(),
            deleted_by: Vec::new(),
            parent_choices: BTreeMap::new(),
            name_choices: BTreeMap::new(),
            attrs_choices: BTreeMap::new(),
            hash_choices: BTreeMap::new(),
            cycle_hint: None,
            cycle_members: Vec::new(),
        }
    }

    /// Identity of the conflicted item.
    #[must_use]
    pub const fn gid(&self) -> Gid {
        self.result.gid
    }

    /// `true` if `cause` is among this conflict's causes.
    #[must_use]
    pub fn has(&self, cause: ConflictCause) -> bool {
        self.causes.contains(cause)
    }

    /// `true` if every cause can be settled by an automated content merge.
    #[must_use]
    pub fn is_auto_mergeable(&self) -> bool {
        !self.causes.is_empty() && self.causes.iter().all(ConflictCause::is_auto_mergeable)
    }

    /// One-line summary for logs and text reports.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut s = format!("{} {:?}: {}", self.result.kind, self.result.name, self.causes);
        if let Some(hint) = &self.cycle_hint {
            s.push_str(&format!(" [{hint}]"));
        }
        s
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.summary(), self.gid().short())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
