//! Identity-keyed three-way tree merge.
//!
//! Given an ancestor snapshot and two leaf snapshots of a versioned tree,
//! produces a merged snapshot and a structured set of conflicts. Items are
//! keyed by a stable identity ([`model::Gid`]), so renames and moves merge
//! like any other field change. Two situations a per-item comparison cannot
//! see are repaired afterwards: children orphaned by a directory delete,
//! and directory moves that together form a path cycle.
//!
//! # Crate layout
//!
//! - [`model`]: identities, entries, snapshots and conflict records.
//! - [`merge`]: the merge engine ([`merge::TreeMerge`], [`merge::compute`])
//!   and the collaborator traits it consumes ([`merge::SnapshotLoader`],
//!   [`merge::HistoryService`]).
//! - [`repo`]: [`repo::MemoryRepo`], an in-memory changeset DAG
//!   implementing both collaborator traits.
//! - [`error`]: [`error::MergeError`] and [`error::StoreError`].
//!
//! Storage, working-copy application and content-level merging are outside
//! this crate: the engine only reports *that* content must be merged.

pub mod error;
pub mod merge;
pub mod model;
pub mod repo;

pub use error::{MergeError, StoreError};
pub use merge::{MergeOptions, MergeOutcome, TreeMerge, compute};
