//! End-to-end runs of the `treemerge` binary against temp fixtures.

#![allow(clippy::all, clippy::pedantic, clippy::nursery)]

mod common;

use common::{Workdir, changeset, dir, file, root, standard_fixture};
use serde_json::{Value, json};

fn merge_args<'a>(repo: &'a str, baseline: &'a str, other: &'a str) -> Vec<&'a str> {
    vec!["merge", "--repo", repo, "--baseline", baseline, "--other", other]
}

#[test]
fn clean_merge_exits_zero() {
    let w = Workdir::with_fixture(&standard_fixture());
    let out = w.run_expecting(0, &merge_args("repo.json", "c1", "c2"));
    assert!(out.starts_with("merged c1 and c2 (ancestor c0)"), "{out}");
    assert!(!out.contains("conflicts ("), "{out}");
}

#[test]
fn clean_merge_as_json_carries_both_changes() {
    let w = Workdir::with_fixture(&standard_fixture());
    let mut args = merge_args("repo.json", "c1", "c2");
    args.extend(["--format", "json"]);
    let out = w.run_expecting(0, &args);

    let v: Value = serde_json::from_str(&out).expect("merge --format json should be valid JSON");
    assert_eq!(v["clean"], true);
    assert_eq!(v["ancestor"], "c0");
    let entries = v["result"]["entries"].as_array().unwrap();
    let readme = entries.iter().find(|e| e["name"] == "README.md");
    assert!(readme.is_some(), "rename from c1 should be kept: {v}");
    assert_eq!(entries.len(), 4);
}

#[test]
fn divergent_rename_exits_one() {
    let w = Workdir::with_fixture(&standard_fixture());
    let out = w.run_expecting(1, &merge_args("repo.json", "c1", "c3"));
    assert!(out.contains("merged with conflicts"), "{out}");
    assert!(out.contains("divergent rename"), "{out}");
    // Baseline's name is the seed.
    assert!(out.contains("  README.md  "), "{out}");
}

#[test]
fn addition_into_deleted_directory_restores_it() {
    let w = Workdir::with_fixture(&standard_fixture());
    let mut args = merge_args("repo.json", "c4", "c5");
    args.extend(["--format", "json"]);
    let out = w.run_expecting(1, &args);

    let v: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(v["stats"]["orphans_restored"], 1);
    let src = &v["conflicts"]["00000000000000000000000000000002"];
    assert!(
        src["causes"].as_array().unwrap().iter().any(|c| c == "delete_caused_orphan"),
        "{v}"
    );
}

#[test]
fn independent_additions_fail_a_merge_but_not_an_update() {
    let w = Workdir::with_fixture(&standard_fixture());

    let out = w.run(&merge_args("repo.json", "c6", "c7"));
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("no common history"), "{stderr}");
    assert!(stderr.contains("new.txt"), "{stderr}");

    let mut args = merge_args("repo.json", "c6", "c7");
    args.push("--update");
    let out = w.run_expecting(1, &args);
    assert!(out.contains("update conflicts (1):"), "{out}");
    assert!(out.contains("new.txt"), "{out}");
}

#[test]
fn update_mode_can_come_from_config() {
    let w = Workdir::with_fixture(&standard_fixture());
    w.write("treemerge.toml", "[merge]\nmode = \"update\"\n\n[output]\nformat = \"json\"\n");

    let out = w.run_expecting(1, &merge_args("repo.json", "c6", "c7"));
    let v: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(v["update_conflicts"].as_array().unwrap().len(), 1);

    // The flag beats the config file.
    let mut args = merge_args("repo.json", "c1", "c2");
    args.extend(["--format", "text"]);
    let out = w.run_expecting(0, &args);
    assert!(out.starts_with("merged"), "{out}");
}

#[test]
fn bad_config_is_an_error() {
    let w = Workdir::with_fixture(&standard_fixture());
    w.write("custom.toml", "[merge]\nstrategy = \"ours\"\n");
    let mut args = merge_args("repo.json", "c1", "c2");
    args.extend(["--config", "custom.toml"]);

    let out = w.run(&args);
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("custom.toml"), "{stderr}");
    assert!(stderr.contains("line 2"), "{stderr}");
}

#[test]
fn unrelated_changesets_need_an_explicit_ancestor() {
    let w = Workdir::with_fixture(&standard_fixture());
    let out = w.run(&merge_args("repo.json", "c1", "x0"));
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("no common ancestor"));
}

#[test]
fn explicit_ancestor_is_used() {
    let w = Workdir::with_fixture(&standard_fixture());
    let mut args = merge_args("repo.json", "c2", "c2");
    args.extend(["--ancestor", "c1"]);
    let out = w.run_expecting(0, &args);
    assert!(out.contains("(ancestor c1)"), "{out}");
}

#[test]
fn unknown_changeset_is_an_error() {
    let w = Workdir::with_fixture(&standard_fixture());
    let out = w.run(&merge_args("repo.json", "c1", "nope"));
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("nope"));
}

#[test]
fn missing_fixture_is_an_error() {
    let w = Workdir::with_fixture(&json!({ "changesets": [] }));
    let out = w.run(&merge_args("absent.json", "a", "b"));
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("loading fixture"));
}

#[test]
fn check_reports_well_formed_tree() {
    let w = Workdir::with_fixture(&standard_fixture());
    let out = w.run_expecting(0, &["check", "--repo", "repo.json", "--changeset", "c0"]);
    assert_eq!(out, "c0: 4 entries, 0 deleted, well-formed\n");
}

#[test]
fn check_reports_broken_tree() {
    let fixture = json!({ "changesets": [
        changeset("bad", &[], vec![root(), dir(2, 7, "lost"), file(3, 1, "f", "x")]),
    ] });
    let w = Workdir::with_fixture(&fixture);
    let out = w.run_expecting(
        1,
        &["check", "--repo", "repo.json", "--changeset", "bad", "--format", "json"],
    );
    let v: Value = serde_json::from_str(&out).unwrap();
    let violations = v["violations"].as_array().unwrap();
    assert!(
        violations.iter().any(|x| x["violation"] == "dangling_parent"),
        "{v}"
    );
    assert!(w.fixture_path().exists());
}
