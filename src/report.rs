//! Rendering merge outcomes and tree checks for the terminal.

use std::fmt::Write as _;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use treemerge_core::merge::MergeOutcome;
use treemerge_core::model::{ChangesetId, Gid, Snapshot, Violation};

/// Output format for reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain text for people.
    #[default]
    Text,
    /// Pretty-printed JSON for scripts.
    Json,
}

impl OutputFormat {
    fn json<T: Serialize>(data: &T) -> Result<String> {
        serde_json::to_string_pretty(data)
            .map_err(|e| anyhow::anyhow!("JSON serialization failed: {e}"))
    }
}

// ---------------------------------------------------------------------------
// Merge report
// ---------------------------------------------------------------------------

/// Everything `treemerge merge` prints.
#[derive(Debug, Serialize)]
pub struct MergeReport<'a> {
    pub ancestor: &'a ChangesetId,
    pub baseline: &'a ChangesetId,
    pub other: &'a ChangesetId,
    pub clean: bool,
    #[serde(flatten)]
    pub outcome: &'a MergeOutcome,
}

impl<'a> MergeReport<'a> {
    #[must_use]
    pub fn new(
        ancestor: &'a ChangesetId,
        baseline: &'a ChangesetId,
        other: &'a ChangesetId,
        outcome: &'a MergeOutcome,
    ) -> Self {
        Self {
            ancestor,
            baseline,
            other,
            clean: outcome.is_clean(),
            outcome,
        }
    }

    /// Render in `format`.
    ///
    /// # Errors
    /// Fails only if JSON serialization fails.
    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => OutputFormat::json(self),
            OutputFormat::Text => Ok(self.text()),
        }
    }

    fn text(&self) -> String {
        let out = self.outcome;
        let result = &out.result;
        let mut s = String::new();
        let _ = writeln!(
            s,
            "{} {} and {} (ancestor {}): {} entries, {} deleted",
            if self.clean { "merged" } else { "merged with conflicts" },
            self.baseline,
            self.other,
            self.ancestor,
            result.len(),
            result.sorted_deletes().len(),
        );

        if !out.conflicts.is_empty() {
            let _ = writeln!(s, "\nconflicts ({}):", out.conflicts.len());
            for (gid, conflict) in &out.conflicts {
                let _ = writeln!(s, "  {}  {}", display_path(result, *gid), conflict.causes);
                if let Some(hint) = &conflict.cycle_hint {
                    let _ = writeln!(s, "      cycle: {hint}");
                }
            }
        }

        if !out.update_conflicts.is_empty() {
            let _ = writeln!(s, "\nupdate conflicts ({}):", out.update_conflicts.len());
            for u in &out.update_conflicts {
                let path = u.path.clone().unwrap_or_else(|| u.gid.short());
                let _ = writeln!(s, "  {path}  {}", u.reason);
            }
        }

        if !out.collisions.is_empty() {
            let _ = writeln!(s, "\nname collisions ({}):", out.collisions.len());
            for c in &out.collisions {
                let dir = display_path(result, c.parent);
                let ids: Vec<String> = c.gids.iter().map(|g| g.short()).collect();
                let _ = writeln!(s, "  {dir}/{}  {}", c.name, ids.join(", "));
            }
        }

        let st = &out.stats;
        let _ = writeln!(
            s,
            "\nstats: quick_scan={} hard_way={} additions={} identical={} per_item_ancestors={} orphans_restored={} cycles_broken={}",
            st.quick_scan,
            st.hard_way,
            st.clean_additions,
            st.identical_additions,
            st.per_item_ancestors,
            st.orphans_restored,
            st.cycles_broken,
        );
        s
    }
}

fn display_path(snapshot: &Snapshot, gid: Gid) -> String {
    match snapshot.path_of(gid) {
        Some(p) if p.is_empty() => "/".to_owned(),
        Some(p) => p,
        None => gid.short(),
    }
}

// ---------------------------------------------------------------------------
// Check report
// ---------------------------------------------------------------------------

/// Well-formedness of one changeset's tree.
#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub changeset: ChangesetId,
    pub entries: usize,
    pub deletes: usize,
    pub violations: Vec<Violation>,
}

impl CheckReport {
    #[must_use]
    pub fn of(changeset: ChangesetId, snapshot: &Snapshot) -> Self {
        Self {
            changeset,
            entries: snapshot.len(),
            deletes: snapshot.sorted_deletes().len(),
            violations: snapshot.check_well_formed(),
        }
    }

    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Render in `format`.
    ///
    /// # Errors
    /// Fails only if JSON serialization fails.
    pub fn render(&self, format: OutputFormat) -> Result<String> {
        if format == OutputFormat::Json {
            return OutputFormat::json(self);
        }
        let mut s = format!(
            "{}: {} entries, {} deleted",
            self.changeset, self.entries, self.deletes
        );
        if self.is_well_formed() {
            s.push_str(", well-formed\n");
        } else {
            let _ = writeln!(s, ", {} problem(s):", self.violations.len());
            for v in &self.violations {
                let _ = writeln!(s, "  {v}");
            }
        }
        Ok(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
