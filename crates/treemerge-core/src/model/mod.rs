//! Data model: identities, entries, snapshots, and conflicts.

pub mod conflict;
pub mod entry;
pub mod gid;
pub mod snapshot;

pub use conflict::{Causes, Conflict, ConflictCause, Leaf, ValueChoices};
pub use entry::{Entry, EntryKind, FieldChanges};
pub use gid::{ChangesetId, ContentHash, Gid};
pub use snapshot::{Snapshot, Violation};
