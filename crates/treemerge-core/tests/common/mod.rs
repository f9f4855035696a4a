//! Shared helpers for treemerge-core integration tests.
//!
//! Trees are written as a base plus edits: `Tree::new` starts from a bare
//! root, `Tree::copy_of` copies an existing snapshot, and the builder methods
//! add, replace or delete entries by identity.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};

use treemerge_core::model::{ChangesetId, ContentHash, Entry, Gid, Snapshot};

pub const ROOT: Gid = Gid::new(1);

pub fn gid(n: u128) -> Gid {
    Gid::new(n)
}

/// Content hash of a short literal.
pub fn h(content: &str) -> ContentHash {
    ContentHash::digest(content.as_bytes())
}

pub fn cs(id: &str) -> ChangesetId {
    ChangesetId::new(id).expect("valid changeset id")
}

/// Snapshot builder keyed by identity.
#[derive(Clone)]
pub struct Tree {
    label: String,
    entries: BTreeMap<Gid, Entry>,
    deletes: BTreeSet<Gid>,
}

impl Tree {
    /// A tree holding only the root.
    pub fn new(label: &str) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(ROOT, Entry::root(ROOT));
        Self {
            label: label.to_owned(),
            entries,
            deletes: BTreeSet::new(),
        }
    }

    /// A copy of `snapshot` under a new label.
    pub fn copy_of(snapshot: &Snapshot, label: &str) -> Self {
        Self {
            label: label.to_owned(),
            entries: snapshot.entries().map(|e| (e.gid, e.clone())).collect(),
            deletes: snapshot.deletes().collect(),
        }
    }

    pub fn dir(self, gid: Gid, parent: Gid, name: &str) -> Self {
        self.set(Entry::directory(gid, parent, name))
    }

    pub fn file(self, gid: Gid, parent: Gid, name: &str, content: &str) -> Self {
        self.set(Entry::file(gid, parent, name, h(content)))
    }

    pub fn symlink(self, gid: Gid, parent: Gid, name: &str, target: &str) -> Self {
        self.set(Entry::symlink(gid, parent, name, h(target)))
    }

    /// Insert or replace an entry.
    pub fn set(mut self, entry: Entry) -> Self {
        self.deletes.remove(&entry.gid);
        self.entries.insert(entry.gid, entry);
        self
    }

    /// Apply `f` to an existing entry.
    pub fn edit(self, gid: Gid, f: impl FnOnce(&Entry) -> Entry) -> Self {
        let current = self.entries.get(&gid).expect("entry to edit").clone();
        self.set(f(&current))
    }

    pub fn rename(self, gid: Gid, name: &str) -> Self {
        self.edit(gid, |e| e.with_name(name))
    }

    pub fn mv(self, gid: Gid, parent: Gid) -> Self {
        self.edit(gid, |e| e.with_parent(Some(parent)))
    }

    pub fn write(self, gid: Gid, content: &str) -> Self {
        self.edit(gid, |e| e.with_hash(Some(h(content))))
    }

    /// Remove an entry and remember the delete.
    pub fn delete(mut self, gid: Gid) -> Self {
        self.entries.remove(&gid);
        self.deletes.insert(gid);
        self
    }

    pub fn build(self) -> Snapshot {
        let mut snap =
            Snapshot::from_entries(self.label, self.entries.into_values()).expect("unique gids");
        for gid in self.deletes {
            snap.register_delete(gid).expect("delete disjoint from entries");
        }
        snap
    }
}
