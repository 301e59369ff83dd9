//! Git operations using git2-rs.

pub mod branches;
pub mod changes;

use std::path::Path;

use git2::Repository;

use crate::error::GitError;

pub use branches::{BranchOps, ContentSource, RepoBranchOps};
pub use changes::{ChangeSource, collect_changes, resolve_commit};

/// Open the repository containing `path`.
pub fn open_repository(path: &Path) -> Result<Repository, GitError> {
    Repository::discover(path).map_err(GitError::OpenRepository)
}

/// URL of a configured remote.
pub fn remote_url(repo: &Repository, name: &str) -> Result<String, GitError> {
    let remote = repo
        .find_remote(name)
        .map_err(|e| GitError::ReferenceNotFound(format!("remote {name}"), e))?;
    remote
        .url()
        .map(str::to_string)
        .ok_or_else(|| GitError::CommandFailed {
            operation: "read remote".to_string(),
            message: format!("remote '{name}' has no valid URL"),
        })
}
