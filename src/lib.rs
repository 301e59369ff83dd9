//! splitpr - Split a large changeset into dependency-ordered, reviewable pull requests.
//!
//! # Overview
//!
//! splitpr takes the files of one changeset (from git, a folder of existing
//! files, or a JSON inventory),
//! partitions them into groups with one of several strategies, orders the
//! groups so that prerequisites merge first, and describes each group as a
//! pull request. The plan can then be materialized as branches and opened on
//! GitHub.
//!
//! Plan generation ([`plan::generate_plan`], [`plan::describe_plan`]) is pure
//! and performs no I/O.

pub mod config;
pub mod error;
pub mod execute;
pub mod git;
pub mod github;
pub mod inventory;
pub mod plan;
pub mod retry;
pub mod scan;

// Re-export commonly used types
pub use config::SplitConfig;
pub use error::{ConfigError, ExecuteError, GitError, GitHubError, PlanError, ScanError};
pub use execute::{CancellationFlag, ExecuteOptions, ExecutionReport, execute_plan};
pub use inventory::{ChangeKind, FileCategory, FileInput, FileInventory, FileRecord};
pub use plan::{
    DescribeOptions, DescribedPlan, PlanConfig, PlanRequest, SplitGroup, SplitPlan, Strategy,
    describe_plan, generate_plan,
};
