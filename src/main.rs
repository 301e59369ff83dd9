//! splitpr - CLI entry point.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use dialoguer::Confirm;
use tempfile::NamedTempFile;
use tracing_subscriber::EnvFilter;

use splitpr::execute::{GroupStatus, execute_plan};
use splitpr::git::{
    BranchOps, ChangeSource, ContentSource, RepoBranchOps, collect_changes, open_repository, remote_url,
};
use splitpr::github::{
    PullRequestOutcome, client_with_token, get_github_token, open_pull_requests, parse_github_remote,
};
use splitpr::inventory::FileInput;
use splitpr::plan::{DependencyRelation, DescribedPlan, PlanRequest, Strategy, describe_plan, generate_plan};
use splitpr::scan::scan_folder;
use splitpr::{CancellationFlag, ExecuteOptions, ExecutionReport, SplitConfig};

/// Split a large changeset into dependency-ordered, reviewable pull requests.
#[derive(Parser, Debug)]
#[command(name = "splitpr")]
#[command(about = "Split a large changeset into dependency-ordered, reviewable pull requests")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a split plan from git changes, a folder, or a JSON file list
    Plan(PlanArgs),

    /// Show the titles, branches and merge order of a plan
    Describe {
        /// Plan file written by `splitpr plan -o`
        plan: PathBuf,

        /// Print every PR body
        #[arg(long)]
        bodies: bool,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create one branch per group of a plan
    Execute(ExecuteArgs),

    /// Open one pull request per group of a plan
    OpenPrs(OpenPrsArgs),

    /// List the available split strategies
    Strategies,
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// JSON file with the changed files (array of {path, lines, ...})
    #[arg(long)]
    files: Option<PathBuf>,

    /// Plan the existing files of this folder instead of a changeset
    #[arg(long, conflicts_with_all = ["files", "from"])]
    folder: Option<PathBuf>,

    /// Base of a commit range (tag, commit hash, or branch); defaults to the working tree
    #[arg(long, conflicts_with = "files")]
    from: Option<String>,

    /// End of the commit range
    #[arg(long, default_value = "HEAD")]
    to: String,

    /// Target number of PRs
    #[arg(short = 'n', long)]
    count: Option<usize>,

    /// Split strategy (by_module, by_file, by_type, balanced)
    #[arg(short, long)]
    strategy: Option<String>,

    /// Branch the PRs merge into
    #[arg(long)]
    base: Option<String>,

    /// Directory depth that identifies a module
    #[arg(long)]
    depth: Option<usize>,

    /// Only plan files matching these globs
    #[arg(long)]
    include: Vec<String>,

    /// Leave out files matching these globs
    #[arg(long)]
    exclude: Vec<String>,

    /// JSON file mapping each path to the paths it depends on
    #[arg(long)]
    deps: Option<PathBuf>,

    /// Weigh files without line counts by size (bytes per line)
    #[arg(long, value_name = "BYTES_PER_LINE")]
    byte_fallback: Option<u64>,

    /// Write the plan to this file
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Print the plan as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ExecuteArgs {
    /// Plan file written by `splitpr plan -o`
    plan: PathBuf,

    /// Revision to take file contents from (defaults to the working tree)
    #[arg(long)]
    source: Option<String>,

    /// Remote to push branches to
    #[arg(long)]
    remote: Option<String>,

    /// Base each branch on the previous one in merge order
    #[arg(long)]
    chain: bool,

    /// Maximum number of groups processed at once
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Only execute these group ids (comma separated)
    #[arg(long, value_delimiter = ',')]
    only: Vec<usize>,

    /// Create branches locally without pushing
    #[arg(long)]
    no_push: bool,

    /// Show what would be created without touching the repository
    #[arg(long)]
    dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Write the execution report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct OpenPrsArgs {
    /// Plan file written by `splitpr plan -o`
    plan: PathBuf,

    /// Target each PR at the branch of the previous group
    #[arg(long)]
    chain: bool,

    /// Open ready-for-review PRs instead of drafts
    #[arg(long)]
    ready: bool,

    /// Remote whose URL identifies the GitHub repository
    #[arg(long)]
    remote: Option<String>,

    /// Only open PRs for these group ids (comma separated)
    #[arg(long, value_delimiter = ',')]
    only: Vec<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env("SPLITPR_LOG").unwrap_or_else(|_| EnvFilter::new("splitpr=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = SplitConfig::load(Path::new(".")).context("Failed to load configuration")?;

    match cli.command {
        Command::Plan(args) => run_plan(args, config),
        Command::Describe { plan, bodies, json } => run_describe(&plan, bodies, json),
        Command::Execute(args) => run_execute(args, config).await,
        Command::OpenPrs(args) => run_open_prs(args, config).await,
        Command::Strategies => {
            for strategy in Strategy::ALL {
                println!("{:<10} {}", strategy.as_str(), strategy.description());
                println!("{:<10} {}", "", strategy.use_case());
            }
            Ok(())
        }
    }
}

fn run_plan(args: PlanArgs, mut config: SplitConfig) -> Result<()> {
    if let Some(count) = args.count {
        config.target_count = count;
    }
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    if let Some(base) = args.base {
        config.base_branch = base;
    }
    if let Some(depth) = args.depth {
        config.module_depth = depth;
    }
    if !args.include.is_empty() {
        config.include = args.include;
    }
    if !args.exclude.is_empty() {
        config.exclude = args.exclude;
    }
    if args.byte_fallback.is_some() {
        config.bytes_per_line = args.byte_fallback;
    }

    let files: Vec<FileInput> = match (&args.files, &args.folder) {
        (Some(path), _) => read_json(path).context("Failed to read file list")?,
        (None, Some(folder)) => scan_folder(folder).context("Failed to scan folder")?,
        (None, None) => {
            let repo = open_repository(Path::new("."))
                .context("Not a git repository. Run splitpr from within a git repository or pass --files.")?;
            let source = match args.from {
                Some(base) => ChangeSource::Range { base, head: args.to },
                None => ChangeSource::WorkingTree,
            };
            collect_changes(&repo, &source).context("Failed to collect changes")?
        }
    };

    let dependencies: Option<DependencyRelation> = match &args.deps {
        Some(path) => Some(read_json(path).context("Failed to read dependency file")?),
        None => None,
    };

    let request = PlanRequest {
        files,
        target_count: config.target_count,
        strategy: config.strategy.clone(),
        dependencies,
        base_branch: config.base_branch.clone(),
    };

    let plan = generate_plan(&request, &config.plan_config()).context("Failed to generate split plan")?;
    let described = describe_plan(&plan, &config.describe_options());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&described)?);
    } else {
        let summary = plan.summary();
        println!(
            "Planned {} PRs for {} files ({} lines) using {}",
            summary.group_count,
            summary.total_files,
            summary.total_lines,
            plan.strategy.as_str()
        );
        print_described(&described, false);
    }

    if let Some(output) = &args.output {
        let json = serde_json::to_string_pretty(&described)?;
        write_atomic(output, &json).with_context(|| format!("Failed to write {}", output.display()))?;
        if !args.json {
            println!("✓ Plan written to {}", output.display());
        }
    }

    Ok(())
}

fn run_describe(path: &Path, bodies: bool, json: bool) -> Result<()> {
    let described = read_plan(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&described)?);
    } else {
        print_described(&described, bodies);
    }
    Ok(())
}

async fn run_execute(args: ExecuteArgs, config: SplitConfig) -> Result<()> {
    let described = read_plan(&args.plan)?;

    let options = ExecuteOptions {
        remote: args.remote.unwrap_or(config.remote),
        push: !args.no_push,
        chain: args.chain || config.chain,
        max_parallel: args.jobs.unwrap_or(config.max_parallel),
        dry_run: args.dry_run,
        only: (!args.only.is_empty()).then(|| args.only.iter().copied().collect()),
    };

    if !args.dry_run && !args.yes {
        print_described(&described, false);
        let action = if options.push { "Create and push" } else { "Create" };
        let confirmed = Confirm::new()
            .with_prompt(format!("{action} {} branches?", selected_count(&described, &options.only)))
            .default(true)
            .interact()
            .context("Confirmation prompt failed")?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let repo = open_repository(Path::new(".")).context("Not a git repository")?;
    let repo_path = repo.workdir().unwrap_or(repo.path()).to_path_buf();
    let content = match args.source {
        Some(revision) => ContentSource::Revision(revision),
        None => ContentSource::WorkingTree,
    };
    let ops: Arc<dyn BranchOps> = Arc::new(RepoBranchOps::new(repo_path, content));

    let cancel = CancellationFlag::new();
    let signal_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling: waiting for running groups to finish...");
            signal_flag.cancel();
        }
    });

    let report = execute_plan(&described, ops, &options, &cancel)
        .await
        .context("Failed to execute plan")?;

    print_report(&report);

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        write_atomic(path, &json).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if !report.is_success() {
        let retry: Vec<String> = report.retry_candidates().iter().map(|id| id.to_string()).collect();
        bail!("Some groups did not complete. Retry with --only {}", retry.join(","));
    }

    Ok(())
}

async fn run_open_prs(args: OpenPrsArgs, config: SplitConfig) -> Result<()> {
    let described = read_plan(&args.plan)?;

    let token = get_github_token().context("GitHub authentication required to open PRs")?;
    let repo = open_repository(Path::new(".")).context("Not a git repository")?;
    let remote = args.remote.unwrap_or(config.remote);
    let url = remote_url(&repo, &remote).with_context(|| format!("No '{remote}' remote found"))?;
    let (owner, repo_name) = parse_github_remote(&url).context("Could not parse GitHub remote URL")?;
    let octocrab = client_with_token(&token)?;

    let groups: BTreeSet<usize> = if args.only.is_empty() {
        described.plan.groups.iter().map(|g| g.id).collect()
    } else {
        args.only.iter().copied().collect()
    };
    if let Some(unknown) = groups.iter().find(|id| described.plan.group(**id).is_none()) {
        bail!("Plan has no group {unknown}");
    }

    let chain = args.chain || config.chain;
    let draft = config.draft && !args.ready;
    let outcomes = open_pull_requests(&octocrab, &owner, &repo_name, &described, &groups, chain, draft).await;

    let mut failed = Vec::new();
    for outcome in &outcomes {
        match outcome {
            PullRequestOutcome::Created { number, url, head, .. } => {
                println!("✓ #{number} {head} {url}");
            }
            PullRequestOutcome::Failed { group_id, head, message } => {
                eprintln!("✗ {head}: {message}");
                failed.push(group_id.to_string());
            }
        }
    }

    if !failed.is_empty() {
        bail!("Could not open PRs for groups {}", failed.join(","));
    }
    Ok(())
}

fn print_described(described: &DescribedPlan, bodies: bool) {
    for description in &described.descriptions {
        let depends_on = described
            .plan
            .group(description.group_id)
            .map(|g| {
                g.depends_on
                    .iter()
                    .map(|id| format!("#{id}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        println!(
            "{:>3}. {} ({} files, ~{} lines)",
            description.position, description.title, description.file_count, description.estimated_lines
        );
        println!("     branch: {}", description.branch_name);
        if !depends_on.is_empty() {
            println!("     after:  {depends_on}");
        }
        if bodies {
            println!();
            println!("{}", description.body);
            println!();
        }
    }
}

fn print_report(report: &ExecutionReport) {
    for outcome in &report.groups {
        match &outcome.status {
            GroupStatus::Succeeded { commit, pushed } => {
                let pushed = if *pushed { ", pushed" } else { "" };
                println!("✓ {} ({}{})", outcome.branch, short_sha(commit), pushed);
            }
            GroupStatus::Failed {
                stage,
                message,
                rolled_back,
            } => {
                let note = if *rolled_back { " (branch removed)" } else { "" };
                eprintln!("✗ {}: {} failed: {}{}", outcome.branch, stage, message, note);
            }
            GroupStatus::NotAttempted(reason) => println!("- {}: {}", outcome.branch, reason),
            GroupStatus::Planned => println!(
                "• {} from {} ({} files)",
                outcome.branch, outcome.base, outcome.file_count
            ),
        }
    }
    println!(
        "{} succeeded, {} failed, {} not attempted",
        report.succeeded().count(),
        report.failed().count(),
        report.not_attempted().count()
    );
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

fn selected_count(described: &DescribedPlan, only: &Option<BTreeSet<usize>>) -> usize {
    only.as_ref()
        .map_or(described.plan.groups.len(), |ids| ids.len())
}

fn read_plan(path: &Path) -> Result<DescribedPlan> {
    read_json(path).with_context(|| format!("Failed to read plan {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Write through a temp file in the same directory, then rename into place.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_bytes())?;
    file.write_all(b"\n")?;
    file.persist(path)?;
    Ok(())
}
