//! Property tests for the merge engine.
//!
//! Random scenarios start from a fixed small tree (three directories and
//! four files) and apply a random edit script to each leaf: renames, moves,
//! content and attribute edits, deletes. A script step that would make the
//! leaf malformed (a directory moved under itself, an item moved into a
//! deleted directory) is dropped, so every leaf is a well-formed tree.
//!
//! # Properties
//!
//! - the quick scan and the conflict builder agree wherever the scan
//!   decides;
//! - merging never fails on well-formed leaves and always yields a
//!   well-formed result;
//! - a merge where one leaf equals the ancestor returns the other leaf,
//!   conflict-free;
//! - identical inputs give byte-identical serialized outcomes.

#![allow(clippy::all, clippy::pedantic, clippy::nursery)]

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use crate::merge::builder;
use crate::merge::engine::{MergeOptions, MergeState, compute};
use crate::merge::history::NoHistory;
use crate::merge::quick_scan;
use crate::model::entry::Entry;
use crate::model::gid::{ContentHash, Gid};
use crate::model::snapshot::Snapshot;

// ---------------------------------------------------------------------------
// Fixed ancestor
// ---------------------------------------------------------------------------

const ROOT: Gid = Gid::new(1);
const DIRS: [Gid; 3] = [Gid::new(2), Gid::new(3), Gid::new(4)];
const FILES: [Gid; 4] = [Gid::new(10), Gid::new(11), Gid::new(12), Gid::new(13)];

fn hash(n: u8) -> ContentHash {
    ContentHash::digest(&[n])
}

fn ancestor() -> Snapshot {
    let mut entries = vec![Entry::root(ROOT)];
    for (i, d) in DIRS.iter().enumerate() {
        entries.push(Entry::directory(*d, ROOT, format!("d{i}")));
    }
    let homes = [DIRS[0], DIRS[1], DIRS[2], ROOT];
    for (i, (f, home)) in FILES.iter().zip(homes).enumerate() {
        entries.push(Entry::file(*f, home, format!("f{i}"), hash(0)));
    }
    Snapshot::from_entries("ancestor", entries).unwrap()
}

fn items() -> Vec<Gid> {
    DIRS.iter().chain(FILES.iter()).copied().collect()
}

// ---------------------------------------------------------------------------
// Edit scripts
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
enum Op {
    Rename(u8),
    Move(u8),
    Edit(u8),
    Attrs(u8),
    Delete,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..3).prop_map(Op::Rename),
        (0u8..4).prop_map(Op::Move),
        (1u8..4).prop_map(Op::Edit),
        (1u8..3).prop_map(Op::Attrs),
        Just(Op::Delete),
    ]
}

fn arb_script() -> impl Strategy<Value = Vec<(usize, Op)>> {
    prop::collection::vec((0usize..7, arb_op()), 0..=6usize)
}

/// Apply `script` to the ancestor, dropping steps that break the tree.
fn leaf(label: &str, script: &[(usize, Op)]) -> Snapshot {
    let all = items();
    let mut entries: BTreeMap<Gid, Entry> =
        ancestor().entries().map(|e| (e.gid, e.clone())).collect();
    let mut deleted: BTreeSet<Gid> = BTreeSet::new();

    for (idx, op) in script {
        let gid = all[*idx];
        let Some(current) = entries.get(&gid).cloned() else {
            continue;
        };
        let mut next = entries.clone();
        let mut next_deleted = deleted.clone();
        match op {
            Op::Rename(n) => {
                next.insert(gid, current.with_name(format!("n{n}")));
            }
            Op::Move(n) => {
                let target = if *n == 0 { ROOT } else { DIRS[usize::from(*n) - 1] };
                next.insert(gid, current.with_parent(Some(target)));
            }
            Op::Edit(n) if !current.is_directory() => {
                next.insert(gid, current.with_hash(Some(hash(*n))));
            }
            Op::Edit(_) => continue,
            Op::Attrs(n) => {
                next.insert(gid, current.with_attrs(u64::from(*n)));
            }
            Op::Delete => {
                // Take the whole subtree with it.
                let mut doomed = vec![gid];
                let mut changed = true;
                while changed {
                    changed = false;
                    for e in next.values() {
                        if let Some(p) = e.parent {
                            if doomed.contains(&p) && !doomed.contains(&e.gid) {
                                doomed.push(e.gid);
                                changed = true;
                            }
                        }
                    }
                }
                for g in doomed {
                    next.remove(&g);
                    next_deleted.insert(g);
                }
            }
        }
        let candidate = Snapshot::from_entries(label, next.values().cloned()).unwrap();
        if candidate.check_well_formed().is_empty() {
            entries = next;
            deleted = next_deleted;
        }
    }

    let mut snap = Snapshot::from_entries(label, entries.into_values()).unwrap();
    for g in deleted {
        snap.register_delete(g).unwrap();
    }
    snap
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Wherever the quick scan settles an entry, the builder settles it the
    /// same way and raises nothing.
    #[test]
    fn quick_scan_agrees_with_builder(s0 in arb_script(), s1 in arb_script()) {
        let a = ancestor();
        let l0 = leaf("l0", &s0);
        let l1 = leaf("l1", &s1);
        let options = MergeOptions::default();

        for gid in a.sorted_gids() {
            let entry = a.entry(gid).unwrap();
            let mut fast = MergeState::new(&a, [&l0, &l1], &options, &NoHistory, &NoHistory);
            let mut slow = MergeState::new(&a, [&l0, &l1], &options, &NoHistory, &NoHistory);

            if quick_scan::try_resolve(&mut fast, entry).unwrap() {
                builder::build(&mut slow, entry).unwrap();
                prop_assert_eq!(fast.result.entry(gid), slow.result.entry(gid));
                prop_assert_eq!(fast.result.is_deleted(gid), slow.result.is_deleted(gid));
                prop_assert!(slow.result.conflict(gid).is_none());
            }
        }
    }

    /// Well-formed leaves always merge into a well-formed result.
    #[test]
    fn merge_result_is_well_formed(s0 in arb_script(), s1 in arb_script()) {
        let a = ancestor();
        let l0 = leaf("l0", &s0);
        let l1 = leaf("l1", &s1);
        let out = compute(&a, &l0, &l1).unwrap();
        prop_assert!(out.result.check_well_formed().is_empty());
        for (gid, conflict) in &out.conflicts {
            prop_assert_eq!(out.result.entry(*gid), Some(&conflict.result));
            prop_assert!(!conflict.causes.is_empty());
        }
    }

    /// When one side did nothing, the merge is the other side.
    #[test]
    fn single_side_change_is_taken_verbatim(s in arb_script()) {
        let a = ancestor();
        let l = leaf("l", &s);

        let mine = compute(&a, &l, &a).unwrap();
        prop_assert!(mine.conflicts.is_empty());
        prop_assert!(mine.result.same_tree(&l));

        let theirs = compute(&a, &a, &l).unwrap();
        prop_assert!(theirs.conflicts.is_empty());
        prop_assert!(theirs.result.same_tree(&l));
    }

    /// Same inputs, same bytes.
    #[test]
    fn merge_is_deterministic(s0 in arb_script(), s1 in arb_script()) {
        let a = ancestor();
        let l0 = leaf("l0", &s0);
        let l1 = leaf("l1", &s1);
        let first = serde_json::to_string(&compute(&a, &l0, &l1).unwrap()).unwrap();
        let second = serde_json::to_string(&compute(&a, &l0, &l1).unwrap()).unwrap();
        prop_assert_eq!(first, second);
    }
}
