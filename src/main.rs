use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context as _, Result, bail};
use clap::{Args, Parser, Subcommand};
use treemerge::config::{DEFAULT_CONFIG_FILE, TreemergeConfig};
use treemerge::core::merge::{MergeMode, TreeMerge};
use treemerge::core::model::{ChangesetId, Snapshot};
use treemerge::fixture;
use treemerge::report::{CheckReport, MergeReport, OutputFormat};
use treemerge::telemetry::{self, LogFormat};

/// Identity-keyed three-way tree merge
///
/// Merges two changesets of a repository fixture against their common
/// ancestor. Items are matched by identity, so renames and moves merge
/// like any other edit. Divergent changes become conflicts in the report;
/// content merges of divergent file edits are left to an external tool.
///
/// EXIT STATUS:
///   0  clean merge / well-formed tree
///   1  conflicts remain / tree has problems
///   2  error
///
/// LOGGING:
///   TREEMERGE_LOG=debug        filter directives (default: warn)
///   TREEMERGE_LOG_FORMAT=json  one JSON object per event
#[derive(Parser)]
#[command(name = "treemerge")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge two changesets
    ///
    /// Without --ancestor the closest common ancestor is computed from the
    /// fixture's parent links.
    Merge(MergeArgs),

    /// Check that a changeset's tree is well formed
    Check(CheckArgs),
}

#[derive(Args)]
struct MergeArgs {
    /// Repository fixture (JSON)
    #[arg(long)]
    repo: PathBuf,

    /// Changeset whose side is seeded first (the local side)
    #[arg(long)]
    baseline: String,

    /// Changeset being merged in
    #[arg(long)]
    other: String,

    /// Common ancestor to merge against
    #[arg(long)]
    ancestor: Option<String>,

    /// Working-copy update: keep the baseline version of items with no
    /// common basis instead of failing
    #[arg(long)]
    update: bool,

    /// Report format (default from config, else text)
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Config file; a missing file means defaults
    #[arg(long, env = "TREEMERGE_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

#[derive(Args)]
struct CheckArgs {
    /// Repository fixture (JSON)
    #[arg(long)]
    repo: PathBuf,

    /// Changeset to check
    #[arg(long)]
    changeset: String,

    /// Report format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
}

fn main() -> ExitCode {
    telemetry::init(LogFormat::from_env());
    let cli = Cli::parse();

    let outcome = match &cli.command {
        Commands::Merge(args) => merge(args),
        Commands::Check(args) => check(args),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

/// Returns `Ok(true)` for a clean merge.
fn merge(args: &MergeArgs) -> Result<bool> {
    let config = TreemergeConfig::load(&args.config)?;
    let repo = load_fixture(&args.repo)?;

    let baseline = changeset_id(&args.baseline)?;
    let other = changeset_id(&args.other)?;
    let ancestor = match &args.ancestor {
        Some(a) => changeset_id(a)?,
        None => {
            let bases = repo
                .common_ancestors(&baseline, &other)
                .context("computing the merge base")?;
            let Some(first) = bases.first() else {
                bail!("{baseline} and {other} have no common ancestor; pass --ancestor");
            };
            if bases.len() > 1 {
                tracing::warn!(
                    candidates = bases.len(),
                    chosen = %first,
                    "several closest common ancestors, merging against the first"
                );
            }
            first.clone()
        }
    };

    let mut options = config.merge.to_options();
    if args.update {
        options.mode = MergeMode::Update;
    }

    let load = |id: &ChangesetId| {
        repo.snapshot(id)
            .with_context(|| format!("reading changeset {id}"))
    };
    let (a, b, o) = (load(&ancestor)?, load(&baseline)?, load(&other)?);
    let leaves: [&Snapshot; 2] = [&b, &o];

    let outcome = TreeMerge::new(&a, &leaves)
        .store(&repo)
        .options(options)
        .run()
        .with_context(|| format!("merging {baseline} and {other}"))?;

    let format = args.format.unwrap_or(config.output.format);
    let report = MergeReport::new(&ancestor, &baseline, &other, &outcome);
    print!("{}", report.render(format)?);
    Ok(report.clean)
}

/// Returns `Ok(true)` when the tree is well formed.
fn check(args: &CheckArgs) -> Result<bool> {
    let repo = load_fixture(&args.repo)?;
    let id = changeset_id(&args.changeset)?;
    let snapshot = repo
        .snapshot(&id)
        .with_context(|| format!("reading changeset {id}"))?;
    let report = CheckReport::of(id, &snapshot);
    print!("{}", report.render(args.format)?);
    Ok(report.is_well_formed())
}

fn load_fixture(path: &Path) -> Result<treemerge::core::repo::MemoryRepo> {
    fixture::load(path).with_context(|| format!("loading fixture {}", path.display()))
}

fn changeset_id(s: &str) -> Result<ChangesetId> {
    ChangesetId::new(s).with_context(|| format!("invalid changeset id {s:?}"))
}
