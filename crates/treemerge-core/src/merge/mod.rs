//! Identity-keyed three-way tree merge.
//!
//! Merges two leaf snapshots (baseline and other) against a common
//! ancestor. Items are matched by [`Gid`](crate::model::Gid), never by
//! path, so renames and moves are ordinary field changes.
//!
//! Pipeline, run by [`TreeMerge::run`]:
//!
//! - **quick scan** ([`quick_scan`]): settle entries at most one leaf touched.
//! - **builder**: collapse each field of the rest ([`collapse`]) and attach
//!   conflicts.
//! - **addition**: entries new since the ancestor, with a per-item ancestor
//!   searched through [`history`] when both leaves hold different versions.
//! - **orphan** / **cycle**: repair what per-entry resolution cannot see.
//! - **collision**: report siblings sharing a name.
//!
//! # Determinism
//!
//! Every pass iterates identities in ascending order. The same inputs
//! always produce the same result, conflicts and diagnostics.

mod addition;
mod builder;
pub mod collapse;
pub mod collision;
mod cycle;
pub mod engine;
pub mod history;
mod orphan;
pub mod quick_scan;

#[cfg(test)]
mod property_tests;

pub use collision::EntrynameCollision;
pub use engine::{
    FoundItem, MergeMode, MergeOptions, MergeOutcome, MergeStats, TreeMerge, UpdateConflict,
    compute,
};
pub use history::{HistoryService, NoHistory, SnapshotLoader};
