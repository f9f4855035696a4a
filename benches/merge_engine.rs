//! Merge engine benchmarks.
//!
//! Measures whole-tree merges over synthetic trees of growing size.
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench merge_engine
//! # With a custom filter:
//! cargo bench --bench merge_engine -- divergent
//! ```
//!
//! # Scenarios
//!
//! - `one_sided`: only the baseline changed; every ancestor entry takes the
//!   quick scan.
//! - `disjoint`: both sides changed different entries.
//! - `divergent`: both sides changed the same entries differently, so the
//!   conflict builder runs for each of them.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use treemerge::core::merge::compute;
use treemerge::core::model::{ContentHash, Entry, Gid, Snapshot};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const ROOT: Gid = Gid::new(1);
const FILES_PER_DIR: usize = 50;

fn dir_gid(d: usize) -> Gid {
    Gid::new(1_000 + d as u128)
}

fn file_gid(f: usize) -> Gid {
    Gid::new(1_000_000 + f as u128)
}

/// `n` files spread over directories of [`FILES_PER_DIR`] each.
fn make_tree(n: usize) -> Snapshot {
    let dirs = n.div_ceil(FILES_PER_DIR);
    let mut entries = vec![Entry::root(ROOT)];
    for d in 0..dirs {
        entries.push(Entry::directory(dir_gid(d), ROOT, format!("dir{d}")));
    }
    for f in 0..n {
        let content = format!("file {f}\n");
        entries.push(Entry::file(
            file_gid(f),
            dir_gid(f / FILES_PER_DIR),
            format!("f{f}.txt"),
            ContentHash::digest(content.as_bytes()),
        ));
    }
    Snapshot::from_entries("ancestor", entries).expect("synthetic tree")
}

/// Copy of `base` with `edit` applied to every `step`-th file from `offset`.
fn edit_every(
    base: &Snapshot,
    label: &str,
    n: usize,
    offset: usize,
    step: usize,
    edit: impl Fn(&Entry) -> Entry,
) -> Snapshot {
    let mut snap = base.clone();
    snap.label = label.to_owned();
    for f in (offset..n).step_by(step) {
        let current = base.entry(file_gid(f)).expect("file exists");
        snap.replace_entry(edit(current)).expect("replace");
    }
    snap
}

fn rewrite(tag: &'static str) -> impl Fn(&Entry) -> Entry {
    move |e| e.with_hash(Some(ContentHash::digest(format!("{tag} {}", e.name).as_bytes())))
}

fn rename(suffix: &'static str) -> impl Fn(&Entry) -> Entry {
    move |e| e.with_name(format!("{}.{suffix}", e.name))
}

const SIZES: &[usize] = &[1_000, 10_000, 50_000];

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_one_sided(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge/one_sided");
    for &n in SIZES {
        let ancestor = make_tree(n);
        let baseline = edit_every(&ancestor, "baseline", n, 0, 10, rewrite("b"));

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("files", n), &n, |b, _| {
            b.iter(|| compute(&ancestor, &baseline, &ancestor).expect("merge"));
        });
    }
    group.finish();
}

fn bench_disjoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge/disjoint");
    for &n in SIZES {
        let ancestor = make_tree(n);
        let baseline = edit_every(&ancestor, "baseline", n, 0, 10, rewrite("b"));
        let other = edit_every(&ancestor, "other", n, 5, 10, rename("old"));

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("files", n), &n, |b, _| {
            b.iter(|| compute(&ancestor, &baseline, &other).expect("merge"));
        });
    }
    group.finish();
}

fn bench_divergent(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge/divergent");
    for &n in SIZES {
        let ancestor = make_tree(n);
        let baseline = edit_every(&ancestor, "baseline", n, 0, 4, rewrite("b"));
        let other = edit_every(&ancestor, "other", n, 0, 4, rewrite("o"));

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("files", n), &n, |b, _| {
            b.iter(|| {
                let out = compute(&ancestor, &baseline, &other).expect("merge");
                assert_eq!(out.conflicts.len(), n.div_ceil(4));
            });
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

criterion_group!(benches, bench_one_sided, bench_disjoint, bench_divergent);
criterion_main!(benches);
