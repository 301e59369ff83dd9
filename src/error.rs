//! Error types for splitpr modules using thiserror.

use std::fmt;

use thiserror::Error;

/// Granularity at which a dependency cycle was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleLevel {
    File,
    Group,
}

impl fmt::Display for CycleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleLevel::File => write!(f, "file"),
            CycleLevel::Group => write!(f, "group"),
        }
    }
}

/// Errors from split plan generation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("No files left to split after applying include/exclude filters")]
    EmptyInventory,

    #[error("Unknown split strategy '{0}'. Expected one of: by_module, by_file, by_type, balanced")]
    InvalidStrategy(String),

    #[error("Target group count must be at least 1 (got {0})")]
    InvalidTargetCount(usize),

    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Cyclic {level}-level dependency between: {}", nodes.join(", "))]
    CyclicDependency { level: CycleLevel, nodes: Vec<String> },

    #[error("Internal error: assembled plan is inconsistent ({0})")]
    InconsistentPlan(String),
}

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Failed to open repository: {0}")]
    OpenRepository(#[source] git2::Error),

    #[error("Failed to find reference '{0}': {1}")]
    ReferenceNotFound(String, #[source] git2::Error),

    #[error("Failed to collect diff: {0}")]
    DiffFailed(#[source] git2::Error),

    #[error("No changes found to split")]
    NoChanges,

    #[error("Branch '{0}' already exists")]
    BranchExists(String),

    #[error("Nothing staged for branch '{0}'")]
    NothingStaged(String),

    #[error("Failed to update branch '{branch}': {source}")]
    BranchUpdate {
        branch: String,
        #[source]
        source: git2::Error,
    },

    #[error("Git config error (missing user.name or user.email): {0}")]
    ConfigError(#[source] git2::Error),

    #[error("Bare repository not supported")]
    BareRepository,

    #[error("git {operation} failed: {message}")]
    CommandFailed { operation: String, message: String },

    #[error("git executable not found in PATH")]
    GitNotInstalled,

    #[error("Background git task failed: {0}")]
    TaskFailed(String),

    #[error("All retry attempts failed: {0}")]
    RetriesExhausted(#[source] Box<GitError>),
}

/// Errors from GitHub API operations.
#[derive(Error, Debug)]
pub enum GitHubError {
    #[error(
        "GitHub authentication failed: no valid auth found. Run 'gh auth login' or set GITHUB_TOKEN environment variable"
    )]
    AuthenticationFailed,

    #[error("Failed to create PR: {0}")]
    CreatePR(#[source] Box<octocrab::Error>),

    #[error("Rate limited by GitHub API. Resets at: {reset_time}")]
    RateLimited { reset_time: String },

    #[error("Repository not found: {owner}/{repo}")]
    RepositoryNotFound { owner: String, repo: String },

    #[error("GitHub rejected PR for branch '{head}': {message}")]
    Rejected { head: String, message: String },

    #[error("Failed to parse repository URL")]
    InvalidRepositoryUrl,
}

/// Errors from scanning a folder for existing files.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Folder not found: {0}")]
    NotADirectory(String),

    #[error("No files found in folder {0}")]
    NoFiles(String),

    #[error("Invalid ignore pattern: {0}")]
    Pattern(#[source] PlanError),
}

/// Errors from configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseFailed { path: String, message: String },

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from split execution setup (per-group failures land in the report).
#[derive(Error, Debug)]
pub enum ExecuteError {
    #[error("Plan and description disagree: {0}")]
    PlanMismatch(String),

    #[error("Unknown group id {0} requested")]
    UnknownGroup(usize),

    #[error("Worker pool size must be at least 1")]
    InvalidParallelism,
}
