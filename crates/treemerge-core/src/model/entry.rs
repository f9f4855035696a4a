//! Tree entries and per-field change classification.
//!
//! An [`Entry`] is the identity-independent state of one versioned item in
//! one snapshot: where it lives (`parent` + `name`), what it is (`kind`),
//! what it holds (`hash`), and its attribute bits. Entries are immutable
//! values; "changing" one means building a new value with one of the
//! `with_*` methods.
//!
//! [`FieldChanges`] is the classification the merge engine works with: which
//! of the four mergeable fields differ between an ancestor entry and a leaf
//! entry.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::gid::{ContentHash, Gid};

// ---------------------------------------------------------------------------
// EntryKind
// ---------------------------------------------------------------------------

/// What kind of item an entry describes. Fixed for the item's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A directory. Never carries a content hash.
    Directory,
    /// A regular file; the hash names its bytes.
    File,
    /// A symbolic link; the hash names its target.
    Symlink,
    /// A nested repository; the hash names the referenced changeset.
    Submodule,
}

impl EntryKind {
    /// `true` for kinds that carry a content hash.
    #[must_use]
    pub const fn has_content(self) -> bool {
        !matches!(self, Self::Directory)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory => write!(f, "directory"),
            Self::File => write!(f, "file"),
            Self::Symlink => write!(f, "symlink"),
            Self::Submodule => write!(f, "submodule"),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// State of one versioned item at one point in one snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry {
    /// Stable identity.
    pub gid: Gid,
    /// Containing directory; `None` only for the root.
    pub parent: Option<Gid>,
    /// Name within the parent directory.
    pub name: String,
    /// Item kind.
    pub kind: EntryKind,
    /// Content digest; `None` for directories, and for files whose content
    /// is pending an external content merge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<ContentHash>,
    /// Attribute bits (e.g. the executable flag).
    #[serde(default)]
    pub attrs: u64,
}

impl Entry {
    /// The root directory of a tree.
    #[must_use]
    pub fn root(gid: Gid) -> Self {
        Self {
            gid,
            parent: None,
            name: String::new(),
            kind: EntryKind::Directory,
            hash: None,
            attrs: 0,
        }
    }

    /// A directory named `name` under `parent`.
    #[must_use]
    pub fn directory(gid: Gid, parent: Gid, name: impl Into<String>) -> Self {
        Self {
            gid,
            parent: Some(parent),
            name: name.into(),
            kind: EntryKind::Directory,
            hash: None,
            attrs: 0,
        }
    }

    /// A regular file named `name` under `parent` with content `hash`.
    #[must_use]
    pub fn file(gid: Gid, parent: Gid, name: impl Into<String>, hash: ContentHash) -> Self {
        Self {
            gid,
            parent: Some(parent),
            name: name.into(),
            kind: EntryKind::File,
            hash: Some(hash),
            attrs: 0,
        }
    }

    /// A symlink named `name` under `parent` whose target digests to `hash`.
    #[must_use]
    pub fn symlink(gid: Gid, parent: Gid, name: impl Into<String>, hash: ContentHash) -> Self {
        Self {
            kind: EntryKind::Symlink,
            ..Self::file(gid, parent, name, hash)
        }
    }

    /// A submodule named `name` under `parent` referencing `hash`.
    #[must_use]
    pub fn submodule(gid: Gid, parent: Gid, name: impl Into<String>, hash: ContentHash) -> Self {
        Self {
            kind: EntryKind::Submodule,
            ..Self::file(gid, parent, name, hash)
        }
    }

    /// `true` if this is the tree root.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// `true` if this entry is a directory.
    #[must_use]
    pub const fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }

    /// Copy with a different parent.
    #[must_use]
    pub fn with_parent(&self, parent: Option<Gid>) -> Self {
        Self {
            parent,
            ..self.clone()
        }
    }

    /// Copy with a different name.
    #[must_use]
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Copy with different attribute bits.
    #[must_use]
    pub fn with_attrs(&self, attrs: u64) -> Self {
        Self {
            attrs,
            ..self.clone()
        }
    }

    /// Copy with a different content hash.
    #[must_use]
    pub fn with_hash(&self, hash: Option<ContentHash>) -> Self {
        Self {
            hash,
            ..self.clone()
        }
    }

    /// Classify how `self` differs from `base`.
    ///
    /// Both entries must describe the same item; the identity is not
    /// compared. A kind mismatch is reported through
    /// [`FieldChanges::kind`] so the caller can reject it.
    #[must_use]
    pub fn changes_from(&self, base: &Self) -> FieldChanges {
        FieldChanges {
            parent: self.parent != base.parent,
            name: self.name != base.name,
            attrs: self.attrs != base.attrs,
            hash: self.hash != base.hash,
            kind: self.kind != base.kind,
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parent {
            Some(p) => write!(
                f,
                "{} {:?} ({}) in {}",
                self.kind,
                self.name,
                self.gid.short(),
                p.short()
            ),
            None => write!(f, "root ({})", self.gid.short()),
        }
    }
}

// ---------------------------------------------------------------------------
// FieldChanges
// ---------------------------------------------------------------------------

/// Which fields of an entry changed relative to a base entry.
///
/// `parent` is a move, `name` a rename, `attrs` an attribute change, `hash`
/// a content edit (file bytes, symlink target, or submodule reference).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FieldChanges {
    /// The item moved to another directory.
    pub parent: bool,
    /// The item was renamed.
    pub name: bool,
    /// Attribute bits changed.
    pub attrs: bool,
    /// Content hash changed.
    pub hash: bool,
    /// The kind changed. Never legitimate for a stable identity.
    pub kind: bool,
}

impl FieldChanges {
    /// `true` if no field changed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !(self.parent || self.name || self.attrs || self.hash || self.kind)
    }
}

impl fmt::Display for FieldChanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "unchanged");
        }
        let mut parts = Vec::new();
        if self.parent {
            parts.push("moved");
        }
        if self.name {
            parts.push("renamed");
        }
        if self.attrs {
            parts.push("attrs");
        }
        if self.hash {
            parts.push("content");
        }
        if self.kind {
            parts.push("kind");
        }
        write!(f, "{}", parts.join("+"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::all, clippy::pedantic, clippy::nursery)]
mod tests {
    use super::*;

    fn h(c: char) -> ContentHash {
        ContentHash::new(&c.to_string().repeat(40)).unwrap()
    }

    #[test]
    fn unchanged_entry_has_no_changes() {
        let e = Entry::file(Gid::new(2), Gid::new(1), "a.txt", h('a'));
        let changes = e.changes_from(&e);
        assert!(changes.is_empty());
        assert_eq!(changes.to_string(), "unchanged");
    }

    #[test]
    fn move_and_rename_are_separate_fields() {
        let base = Entry::file(Gid::new(2), Gid::new(1), "a.txt", h('a'));
        let leaf = base.with_parent(Some(Gid::new(3))).with_name("b.txt");
        let changes = leaf.changes_from(&base);
        assert!(changes.parent);
        assert!(changes.name);
        assert!(!changes.hash);
        assert!(!changes.attrs);
        assert_eq!(changes.to_string(), "moved+renamed");
    }

    #[test]
    fn content_and_attrs_changes() {
        let base = Entry::file(Gid::new(2), Gid::new(1), "a.txt", h('a'));
        let leaf = base.with_hash(Some(h('b'))).with_attrs(1);
        let changes = leaf.changes_from(&base);
        assert!(changes.hash && changes.attrs);
        assert!(!changes.parent && !changes.name);
    }

    #[test]
    fn kind_change_is_flagged() {
        let base = Entry::file(Gid::new(2), Gid::new(1), "a", h('a'));
        let leaf = Entry::symlink(Gid::new(2), Gid::new(1), "a", h('a'));
        assert!(leaf.changes_from(&base).kind);
    }

    #[test]
    fn directories_have_no_content() {
        let d = Entry::directory(Gid::new(5), Gid::new(1), "src");
        assert!(d.is_directory());
        assert!(!d.kind.has_content());
        assert!(d.hash.is_none());
        assert!(Entry::root(Gid::new(1)).is_root());
    }

    #[test]
    fn entry_json_omits_missing_hash() {
        let d = Entry::directory(Gid::new(5), Gid::new(1), "src");
        let json = serde_json::to_value(&d).unwrap();
        assert!(json.get("hash").is_none());
        assert_eq!(json["kind"], "directory");
    }
}
