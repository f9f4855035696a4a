//! Cycle repair.
//!
//! Two directory moves that are each fine alone can together put a
//! directory inside itself: baseline moves `a` under `b`, other moves `b`
//! under `a`. Only moved directories can close a cycle, so walks start
//! from them. Every member of a cycle is flagged
//! [`ConflictCause::MovesCausedPathCycle`]; members whose result parent
//! differs from their baseline parent are also moved back there (to the
//! ancestor parent if the baseline does not hold it). Moving a directory
//! back can reference a deleted directory, so orphan repair runs on every
//! moved member. The pass repeats until no cycle is left.

use crate::error::MergeError;
use crate::model::conflict::{ConflictCause, Leaf};
use crate::model::entry::Entry;
use crate::model::gid::Gid;
use crate::model::snapshot::Snapshot;

use super::engine::MergeState;
use super::orphan::repair_orphans;

/// Break every path cycle in the result.
///
/// # Errors
/// Returns [`MergeError::InvariantViolation`] if a cycle survives a pass
/// unchanged, which means the baseline itself is cyclic.
pub fn repair_cycles(state: &mut MergeState<'_>) -> Result<(), MergeError> {
    loop {
        let starts: Vec<Gid> = state
            .result
            .sorted_gids()
            .into_iter()
            .filter(|gid| is_moved_directory(state, *gid))
            .collect();
        let cycles = state.result.find_cycles(starts);
        if cycles.is_empty() {
            return Ok(());
        }

        let mut reverted: Vec<Gid> = Vec::new();
        for members in &cycles {
            let hints: Vec<(Gid, String)> = members
                .iter()
                .map(|gid| (*gid, wanted_nesting(&state.result, *gid)))
                .collect();

            for (gid, hint) in hints {
                let Some(current) = state.result.entry(gid).cloned() else {
                    continue;
                };
                let target = state
                    .leaf_entry(Leaf::Baseline, gid)
                    .or_else(|| state.ancestor_entry(gid))
                    .and_then(|e| e.parent);
                if let Some(target) = target
                    && current.parent != Some(target)
                {
                    tracing::debug!(
                        gid = %gid,
                        name = %current.name,
                        wanted = %hint,
                        "breaking path cycle"
                    );
                    state.result.replace_entry(current.with_parent(Some(target)))?;
                    reverted.push(gid);
                }

                let conflict = state.add_cause(gid, ConflictCause::MovesCausedPathCycle)?;
                conflict.cycle_hint = Some(hint);
                conflict.cycle_members = members.iter().copied().filter(|m| *m != gid).collect();
            }
        }

        if reverted.is_empty() {
            return Err(MergeError::invariant(format!(
                "cannot break path cycle among {}",
                describe_members(&cycles)
            )));
        }
        state.stats.cycles_broken += cycles.len();
        repair_orphans(state, reverted)?;
    }
}

/// A directory whose result parent differs from its ancestor or baseline
/// parent.
fn is_moved_directory(state: &MergeState<'_>, gid: Gid) -> bool {
    let Some(entry) = state.result.entry(gid) else {
        return false;
    };
    if !entry.is_directory() {
        return false;
    }
    let differs = |other: Option<&Entry>| other.is_some_and(|o| o.parent != entry.parent);
    differs(state.ancestor_entry(gid)) || differs(state.leaf_entry(Leaf::Baseline, gid))
}

/// The impossible path the cycle asks for, outermost first: `"a/b/a"`
/// reads "a contains b contains a".
fn wanted_nesting(result: &Snapshot, start: Gid) -> String {
    let mut names: Vec<&str> = Vec::new();
    let mut current = start;
    for _ in 0..=result.len() {
        let Some(entry) = result.entry(current) else {
            break;
        };
        names.push(entry.name.as_str());
        match entry.parent {
            Some(p) if p == start => {
                if let Some(first) = result.entry(start) {
                    names.push(first.name.as_str());
                }
                break;
            }
            Some(p) => current = p,
            None => break,
        }
    }
    names.reverse();
    names.join("/")
}

fn describe_members(cycles: &[Vec<Gid>]) -> String {
    cycles
        .iter()
        .map(|c| {
            c.iter()
                .map(|g| g.short())
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
