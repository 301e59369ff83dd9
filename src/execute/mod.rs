//! Materializing a described plan as branches.
//!
//! Each group runs create branch -> stage -> commit -> push as one unit. A
//! failure after the branch exists deletes the branch again, so a group is
//! either fully present or absent. Independent groups run on a bounded
//! worker pool; chained groups run one after another in merge order, each
//! based on the previous group's branch.

pub mod cancel;
pub mod report;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::error::{ExecuteError, GitError};
use crate::git::BranchOps;
use crate::plan::DescribedPlan;

pub use cancel::CancellationFlag;
pub use report::{ExecutionReport, GroupOutcome, GroupStatus, SkipReason, Stage};

/// Default worker pool size.
pub const DEFAULT_MAX_PARALLEL: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub remote: String,
    pub push: bool,
    /// Base each branch on the previous group's branch instead of the plan base.
    pub chain: bool,
    pub max_parallel: usize,
    pub dry_run: bool,
    /// Restrict execution to these group ids.
    pub only: Option<BTreeSet<usize>>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            push: true,
            chain: false,
            max_parallel: DEFAULT_MAX_PARALLEL,
            dry_run: false,
            only: None,
        }
    }
}

/// Everything needed to materialize one group, detached from the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
struct GroupJob {
    group_id: usize,
    branch: String,
    base: String,
    /// Member paths plus the old side of renames.
    paths: Vec<String>,
    message: String,
    file_count: usize,
}

impl GroupJob {
    fn outcome(&self, status: GroupStatus) -> GroupOutcome {
        GroupOutcome {
            group_id: self.group_id,
            branch: self.branch.clone(),
            base: self.base.clone(),
            file_count: self.file_count,
            status,
        }
    }
}

/// Create (and optionally push) one branch per group.
///
/// Setup problems (inconsistent description, unknown `only` ids, zero pool
/// size) are errors. Everything else is reported per group.
pub async fn execute_plan(
    described: &DescribedPlan,
    ops: Arc<dyn BranchOps>,
    options: &ExecuteOptions,
    cancel: &CancellationFlag,
) -> Result<ExecutionReport, ExecuteError> {
    if options.max_parallel == 0 {
        return Err(ExecuteError::InvalidParallelism);
    }
    let jobs = build_jobs(described, options.chain)?;
    if let Some(only) = &options.only
        && let Some(unknown) = only.iter().find(|id| !jobs.iter().any(|j| j.group_id == **id))
    {
        return Err(ExecuteError::UnknownGroup(*unknown));
    }

    let started_at = Utc::now();
    let selected = |job: &GroupJob| {
        options
            .only
            .as_ref()
            .is_none_or(|only| only.contains(&job.group_id))
    };

    let groups = if options.dry_run {
        jobs.iter()
            .map(|job| {
                let status = if selected(job) {
                    GroupStatus::Planned
                } else {
                    GroupStatus::NotAttempted(SkipReason::NotSelected)
                };
                job.outcome(status)
            })
            .collect()
    } else if options.chain {
        run_chained(&jobs, ops, options, cancel, &selected).await
    } else {
        run_independent(&jobs, ops, options, cancel, &selected).await
    };

    Ok(ExecutionReport {
        started_at,
        finished_at: Utc::now(),
        dry_run: options.dry_run,
        groups,
    })
}

fn build_jobs(described: &DescribedPlan, chain: bool) -> Result<Vec<GroupJob>, ExecuteError> {
    let plan = &described.plan;
    if described.descriptions.len() != plan.groups.len() {
        return Err(ExecuteError::PlanMismatch(format!(
            "{} descriptions for {} groups",
            described.descriptions.len(),
            plan.groups.len()
        )));
    }

    let mut jobs = Vec::with_capacity(plan.groups.len());
    let mut previous_branch: Option<String> = None;

    for description in &described.descriptions {
        let group = plan.group(description.group_id).ok_or_else(|| {
            ExecuteError::PlanMismatch(format!("no group with id {}", description.group_id))
        })?;

        let mut paths: BTreeSet<String> = group.files.iter().map(|f| f.path.clone()).collect();
        paths.extend(group.files.iter().filter_map(|f| f.old_path.clone()));

        let base = match (chain, &previous_branch) {
            (true, Some(branch)) => branch.clone(),
            _ => plan.base_branch.clone(),
        };
        previous_branch = Some(description.branch_name.clone());

        jobs.push(GroupJob {
            group_id: group.id,
            branch: description.branch_name.clone(),
            base,
            paths: paths.into_iter().collect(),
            message: description.title.clone(),
            file_count: group.file_count(),
        });
    }

    Ok(jobs)
}

/// Run groups concurrently, at most `max_parallel` at a time.
///
/// Groups are started in merge order. Cancellation is checked before each
/// start; running groups are allowed to finish.
async fn run_independent(
    jobs: &[GroupJob],
    ops: Arc<dyn BranchOps>,
    options: &ExecuteOptions,
    cancel: &CancellationFlag,
    selected: &dyn Fn(&GroupJob) -> bool,
) -> Vec<GroupOutcome> {
    let semaphore = Arc::new(Semaphore::new(options.max_parallel));
    let mut slots: Vec<Slot> = Vec::with_capacity(jobs.len());

    for job in jobs {
        if !selected(job) {
            slots.push(Slot::Done(job.outcome(GroupStatus::NotAttempted(SkipReason::NotSelected))));
            continue;
        }

        let permit = if cancel.is_cancelled() {
            None
        } else {
            Arc::clone(&semaphore).acquire_owned().await.ok()
        };
        let Some(permit) = permit.filter(|_| !cancel.is_cancelled()) else {
            slots.push(Slot::Done(job.outcome(GroupStatus::NotAttempted(SkipReason::Cancelled))));
            continue;
        };

        let ops = Arc::clone(&ops);
        let task_job = job.clone();
        let remote = options.remote.clone();
        let push = options.push;
        let handle = tokio::spawn(async move {
            let _permit = permit;
            let status = run_group(ops.as_ref(), &task_job, &remote, push).await;
            task_job.outcome(status)
        });
        slots.push(Slot::Running(job.clone(), handle));
    }

    let mut outcomes = Vec::with_capacity(slots.len());
    for slot in slots {
        match slot {
            Slot::Done(outcome) => outcomes.push(outcome),
            Slot::Running(job, handle) => match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => outcomes.push(job.outcome(GroupStatus::Failed {
                    stage: Stage::Task,
                    message: e.to_string(),
                    rolled_back: false,
                })),
            },
        }
    }
    outcomes
}

enum Slot {
    Done(GroupOutcome),
    Running(GroupJob, tokio::task::JoinHandle<GroupOutcome>),
}

/// Run groups one at a time in merge order. A failure blocks every later group.
async fn run_chained(
    jobs: &[GroupJob],
    ops: Arc<dyn BranchOps>,
    options: &ExecuteOptions,
    cancel: &CancellationFlag,
    selected: &dyn Fn(&GroupJob) -> bool,
) -> Vec<GroupOutcome> {
    let mut outcomes = Vec::with_capacity(jobs.len());
    let mut failed: Option<usize> = None;

    for job in jobs {
        let status = if !selected(job) {
            GroupStatus::NotAttempted(SkipReason::NotSelected)
        } else if let Some(group_id) = failed {
            GroupStatus::NotAttempted(SkipReason::BlockedBy { group_id })
        } else if cancel.is_cancelled() {
            GroupStatus::NotAttempted(SkipReason::Cancelled)
        } else {
            let status = run_group(ops.as_ref(), job, &options.remote, options.push).await;
            if matches!(status, GroupStatus::Failed { .. }) {
                failed = Some(job.group_id);
            }
            status
        };
        outcomes.push(job.outcome(status));
    }
    outcomes
}

/// Create, stage, commit and push one group, rolling back on failure.
async fn run_group(ops: &dyn BranchOps, job: &GroupJob, remote: &str, push: bool) -> GroupStatus {
    info!("Creating {} from {} ({} files)", job.branch, job.base, job.file_count);

    if let Err(e) = ops.create_branch(&job.base, &job.branch).await {
        return failure(Stage::CreateBranch, e, false);
    }

    let commit = match stage_and_commit(ops, job).await {
        Ok(commit) => commit,
        Err((stage, e)) => return rollback(ops, job, stage, e).await,
    };

    if push && let Err(e) = ops.push(remote, &job.branch).await {
        return rollback(ops, job, Stage::Push, e).await;
    }

    GroupStatus::Succeeded {
        commit,
        pushed: push,
    }
}

async fn stage_and_commit(ops: &dyn BranchOps, job: &GroupJob) -> Result<String, (Stage, GitError)> {
    ops.stage_files(&job.branch, &job.paths)
        .await
        .map_err(|e| (Stage::Stage, e))?;
    ops.commit(&job.branch, &job.message)
        .await
        .map_err(|e| (Stage::Commit, e))
}

async fn rollback(ops: &dyn BranchOps, job: &GroupJob, stage: Stage, error: GitError) -> GroupStatus {
    warn!("{} failed for {}: {}", stage, job.branch, error);
    match ops.delete_branch(&job.branch).await {
        Ok(()) => failure(stage, error, true),
        Err(rollback_error) => {
            warn!("Rollback of {} failed: {}", job.branch, rollback_error);
            GroupStatus::Failed {
                stage,
                message: format!("{error} (rollback failed: {rollback_error})"),
                rolled_back: false,
            }
        }
    }
}

fn failure(stage: Stage, error: GitError, rolled_back: bool) -> GroupStatus {
    GroupStatus::Failed {
        stage,
        message: error.to_string(),
        rolled_back,
    }
}
