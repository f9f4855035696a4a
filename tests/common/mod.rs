//! Shared helpers for treemerge CLI integration tests.
//!
//! Every test writes its fixture into its own temp directory and runs the
//! binary there, so no test sees another's files.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::{Value, json};
use tempfile::TempDir;

/// A temp directory holding `repo.json`.
pub struct Workdir {
    pub dir: TempDir,
}

impl Workdir {
    pub fn with_fixture(fixture: &Value) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        std::fs::write(
            dir.path().join("repo.json"),
            serde_json::to_string_pretty(fixture).unwrap(),
        )
        .expect("failed to write fixture");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn fixture_path(&self) -> PathBuf {
        self.dir.path().join("repo.json")
    }

    pub fn write(&self, name: &str, contents: &str) {
        std::fs::write(self.dir.path().join(name), contents).expect("failed to write file");
    }

    /// Run treemerge in this directory.
    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_treemerge"))
            .args(args)
            .current_dir(self.path())
            .env_remove("TREEMERGE_CONFIG")
            .env_remove("TREEMERGE_LOG")
            .env_remove("TREEMERGE_LOG_FORMAT")
            .output()
            .expect("failed to execute treemerge")
    }

    /// Run and assert the exit code. Returns stdout.
    pub fn run_expecting(&self, code: i32, args: &[&str]) -> String {
        let out = self.run(args);
        let stdout = String::from_utf8_lossy(&out.stdout).to_string();
        let stderr = String::from_utf8_lossy(&out.stderr);
        assert_eq!(
            out.status.code(),
            Some(code),
            "treemerge {} exited {:?}:\nstdout: {stdout}\nstderr: {stderr}",
            args.join(" "),
            out.status.code(),
        );
        stdout
    }
}

// ---------------------------------------------------------------------------
// Fixture building
// ---------------------------------------------------------------------------

pub fn root() -> Value {
    json!({ "gid": 1, "name": "", "kind": "directory" })
}

pub fn dir(gid: u64, parent: u64, name: &str) -> Value {
    json!({ "gid": gid, "parent": parent, "name": name, "kind": "directory" })
}

pub fn file(gid: u64, parent: u64, name: &str, content: &str) -> Value {
    json!({ "gid": gid, "parent": parent, "name": name, "kind": "file", "content": content })
}

pub fn changeset(id: &str, parents: &[&str], entries: Vec<Value>) -> Value {
    json!({ "id": id, "parents": parents, "entries": entries })
}

pub fn changeset_with_deletes(
    id: &str,
    parents: &[&str],
    entries: Vec<Value>,
    deletes: &[u64],
) -> Value {
    json!({ "id": id, "parents": parents, "entries": entries, "deletes": deletes })
}

/// `src/a.rs` and `README` under the root.
pub fn base_entries() -> Vec<Value> {
    vec![
        root(),
        dir(2, 1, "src"),
        file(3, 2, "a.rs", "fn a() {}\n"),
        file(4, 1, "README", "hello\n"),
    ]
}

/// `base_entries` with one entry swapped for `replacement` (matched by gid).
pub fn base_with(replacement: Value) -> Vec<Value> {
    base_entries()
        .into_iter()
        .map(|e| if e["gid"] == replacement["gid"] { replacement.clone() } else { e })
        .collect()
}

/// The standard fixture:
///
/// ```text
/// c0 ─┬─ c1  README → README.md
///     ├─ c2  src/a.rs edited
///     ├─ c3  README → README.txt
///     ├─ c4  src/ deleted
///     ├─ c5  src/b.rs added
///     ├─ c6  new.txt = "p"
///     └─ c7  new.txt = "q" (same identity as c6's)
/// x0     unrelated root
/// ```
pub fn standard_fixture() -> Value {
    let mut with_b = base_entries();
    with_b.push(file(5, 2, "b.rs", "fn b() {}\n"));
    let mut with_p = base_entries();
    with_p.push(file(20, 1, "new.txt", "p"));
    let mut with_q = base_entries();
    with_q.push(file(20, 1, "new.txt", "q"));

    json!({ "changesets": [
        changeset("c0", &[], base_entries()),
        changeset("c1", &["c0"], base_with(file(4, 1, "README.md", "hello\n"))),
        changeset("c2", &["c0"], base_with(file(3, 2, "a.rs", "fn a() { 2 }\n"))),
        changeset("c3", &["c0"], base_with(file(4, 1, "README.txt", "hello\n"))),
        changeset_with_deletes(
            "c4",
            &["c0"],
            vec![root(), file(4, 1, "README", "hello\n")],
            &[2, 3],
        ),
        changeset("c5", &["c0"], with_b),
        changeset("c6", &["c0"], with_p),
        changeset("c7", &["c0"], with_q),
        changeset("x0", &[], vec![root(), file(9, 1, "other", "x")]),
    ] })
}
