//! Execution outcome per group.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Step of a group's branch sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    CreateBranch,
    Stage,
    Commit,
    Push,
    Task,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::CreateBranch => write!(f, "create branch"),
            Stage::Stage => write!(f, "stage files"),
            Stage::Commit => write!(f, "commit"),
            Stage::Push => write!(f, "push"),
            Stage::Task => write!(f, "worker task"),
        }
    }
}

/// Why a group was never started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    Cancelled,
    /// An earlier group in the chain failed.
    BlockedBy { group_id: usize },
    NotSelected,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Cancelled => write!(f, "cancelled"),
            SkipReason::BlockedBy { group_id } => write!(f, "blocked by failed group {group_id}"),
            SkipReason::NotSelected => write!(f, "not selected"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GroupStatus {
    Succeeded {
        commit: String,
        pushed: bool,
    },
    Failed {
        stage: Stage,
        message: String,
        /// Whether the partially created branch was removed again.
        rolled_back: bool,
    },
    NotAttempted(SkipReason),
    /// Dry run: what would have been done.
    Planned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupOutcome {
    pub group_id: usize,
    pub branch: String,
    pub base: String,
    pub file_count: usize,
    pub status: GroupStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    /// Outcomes in merge order.
    pub groups: Vec<GroupOutcome>,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &GroupOutcome> {
        self.groups
            .iter()
            .filter(|g| matches!(g.status, GroupStatus::Succeeded { .. }))
    }

    pub fn failed(&self) -> impl Iterator<Item = &GroupOutcome> {
        self.groups
            .iter()
            .filter(|g| matches!(g.status, GroupStatus::Failed { .. }))
    }

    pub fn not_attempted(&self) -> impl Iterator<Item = &GroupOutcome> {
        self.groups
            .iter()
            .filter(|g| matches!(g.status, GroupStatus::NotAttempted(_)))
    }

    /// Ids of groups whose branch was created and pushed.
    pub fn pushed_groups(&self) -> BTreeSet<usize> {
        self.groups
            .iter()
            .filter(|g| matches!(g.status, GroupStatus::Succeeded { pushed: true, .. }))
            .map(|g| g.group_id)
            .collect()
    }

    /// Ids to pass back as `only` to retry everything that did not succeed.
    pub fn retry_candidates(&self) -> BTreeSet<usize> {
        self.groups
            .iter()
            .filter(|g| {
                matches!(
                    g.status,
                    GroupStatus::Failed { .. }
                        | GroupStatus::NotAttempted(SkipReason::Cancelled | SkipReason::BlockedBy { .. })
                )
            })
            .map(|g| g.group_id)
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
            && !self
                .groups
                .iter()
                .any(|g| matches!(g.status, GroupStatus::NotAttempted(SkipReason::Cancelled | SkipReason::BlockedBy { .. })))
    }
}
