//! treemerge library crate: the pieces behind the `treemerge` binary.
//!
//! The merge engine itself lives in [`treemerge_core`]; this crate adds
//! what a command-line front end needs around it: configuration, JSON
//! repository fixtures, report rendering and tracing setup. They are
//! exposed here so integration tests and benchmarks can drive them
//! without spawning the binary.

pub mod config;
pub mod fixture;
pub mod report;
pub mod telemetry;

pub use treemerge_core as core;
