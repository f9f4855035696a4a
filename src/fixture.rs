//! JSON repository fixtures.
//!
//! A fixture lists changesets parents-first; each names its parents and
//! the full tree it holds:
//!
//! ```json
//! { "changesets": [
//!     { "id": "c0", "entries": [
//!         { "gid": 1, "name": "", "kind": "directory" },
//!         { "gid": 2, "parent": 1, "name": "a.txt", "kind": "file", "content": "hello\n" }
//!     ] },
//!     { "id": "c1", "parents": ["c0"], "entries": [ ... ], "deletes": [2] }
//! ] }
//! ```
//!
//! Identities are small integers or 32-digit hex strings. A content-bearing
//! entry gives either a precomputed `hash` or literal `content`, which is
//! hashed with SHA-256.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use treemerge_core::model::{ChangesetId, ContentHash, Entry, EntryKind, Gid, Snapshot};
use treemerge_core::repo::MemoryRepo;

// ---------------------------------------------------------------------------
// FixtureError
// ---------------------------------------------------------------------------

/// Errors reading or interpreting a fixture.
#[derive(Debug)]
pub enum FixtureError {
    /// The file could not be read.
    Io { path: PathBuf, source: std::io::Error },
    /// The text is not a valid fixture document.
    Json(serde_json::Error),
    /// A changeset is valid JSON but does not describe a usable tree.
    Changeset { id: String, message: String },
}

impl fmt::Display for FixtureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Json(e) => write!(f, "invalid fixture: {e}"),
            Self::Changeset { id, message } => write!(f, "changeset {id}: {message}"),
        }
    }
}

impl std::error::Error for FixtureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json(e) => Some(e),
            Self::Changeset { .. } => None,
        }
    }
}

impl From<serde_json::Error> for FixtureError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

// ---------------------------------------------------------------------------
// Document shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FixtureDoc {
    changesets: Vec<ChangesetDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChangesetDoc {
    id: String,
    #[serde(default)]
    parents: Vec<String>,
    #[serde(default)]
    label: String,
    #[serde(default)]
    entries: Vec<EntryDoc>,
    #[serde(default)]
    deletes: Vec<GidDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntryDoc {
    gid: GidDoc,
    #[serde(default)]
    parent: Option<GidDoc>,
    #[serde(default)]
    name: String,
    kind: EntryKind,
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    attrs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum GidDoc {
    Number(u64),
    Hex(String),
}

impl GidDoc {
    fn resolve(&self) -> Result<Gid, String> {
        match self {
            Self::Number(n) => Ok(Gid::new(u128::from(*n))),
            Self::Hex(s) => Gid::from_hex(s).map_err(|e| e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Read a fixture file into a repository.
///
/// # Errors
/// Returns [`FixtureError`] if the file cannot be read or does not describe
/// a valid changeset graph.
pub fn load(path: &Path) -> Result<MemoryRepo, FixtureError> {
    let text = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
        path: path.to_owned(),
        source,
    })?;
    parse(&text)
}

/// Build a repository from fixture text.
///
/// # Errors
/// Returns [`FixtureError::Json`] for malformed JSON and
/// [`FixtureError::Changeset`] for a bad id, identity, hash, duplicate or
/// dangling parent.
pub fn parse(text: &str) -> Result<MemoryRepo, FixtureError> {
    let doc: FixtureDoc = serde_json::from_str(text)?;
    let mut repo = MemoryRepo::new();
    for cs in doc.changesets {
        let fail = |message: String| FixtureError::Changeset {
            id: cs.id.clone(),
            message,
        };
        let id = ChangesetId::new(&cs.id).map_err(|e| fail(e.to_string()))?;
        let parents = cs
            .parents
            .iter()
            .map(|p| ChangesetId::new(p).map_err(|e| fail(e.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        let mut snapshot = Snapshot::new(cs.label.clone());
        for doc in &cs.entries {
            let entry = entry_from_doc(doc).map_err(&fail)?;
            snapshot.insert_entry(entry).map_err(|e| fail(e.to_string()))?;
        }
        for gid in &cs.deletes {
            let gid = gid.resolve().map_err(&fail)?;
            snapshot.register_delete(gid).map_err(|e| fail(e.to_string()))?;
        }

        tracing::debug!(changeset = %id, entries = snapshot.len(), "fixture changeset");
        repo.add_changeset(id, parents, snapshot)
            .map_err(|e| fail(e.to_string()))?;
    }
    Ok(repo)
}

fn entry_from_doc(doc: &EntryDoc) -> Result<Entry, String> {
    let gid = doc.gid.resolve()?;
    let parent = doc.parent.as_ref().map(GidDoc::resolve).transpose()?;
    let hash = match (&doc.hash, &doc.content) {
        (Some(_), Some(_)) => {
            return Err(format!("entry {gid} gives both hash and content"));
        }
        (Some(h), None) => Some(ContentHash::new(h).map_err(|e| e.to_string())?),
        (None, Some(c)) => Some(ContentHash::digest(c.as_bytes())),
        (None, None) => None,
    };
    if hash.is_some() && !doc.kind.has_content() {
        return Err(format!("directory {gid} cannot carry content"));
    }
    Ok(Entry {
        gid,
        parent,
        name: doc.name.clone(),
        kind: doc.kind,
        hash,
        attrs: doc.attrs,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
