//! Branch operations used to materialize a split plan.
//!
//! Trees are built in memory with git2 from a content source (a revision or
//! the working tree), so creating a group's branch never touches the user's
//! checkout or index. Pushing shells out to the system `git` binary to
//! inherit the user's SSH agent and credential helpers.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use git2::build::TreeUpdateBuilder;
use git2::{BranchType, Commit, ErrorCode, FileMode, Oid, Repository, Tree};
use tokio::process::Command;
use tracing::debug;

use crate::error::GitError;
use crate::retry::retry_with_backoff;

/// Branch-level git operations for one group.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BranchOps: Send + Sync {
    /// Create `name` pointing at `base`. Fails if `name` already exists.
    async fn create_branch(&self, base: &str, name: &str) -> Result<(), GitError>;

    /// Stage the final content of `paths` for the next commit on `branch`.
    /// Paths absent from the content source are staged as deletions.
    async fn stage_files(&self, branch: &str, paths: &[String]) -> Result<(), GitError>;

    /// Commit what was staged for `branch` and advance it. Returns the commit id.
    async fn commit(&self, branch: &str, message: &str) -> Result<String, GitError>;

    async fn push(&self, remote: &str, branch: &str) -> Result<(), GitError>;

    /// Delete a local branch. Deleting a branch that does not exist succeeds.
    async fn delete_branch(&self, name: &str) -> Result<(), GitError>;
}

/// Where the final file contents come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    WorkingTree,
    Revision(String),
}

/// [`BranchOps`] backed by a repository on disk.
pub struct RepoBranchOps {
    repo_path: PathBuf,
    content: ContentSource,
    staged: Arc<Mutex<HashMap<String, Oid>>>,
}

impl RepoBranchOps {
    pub fn new(repo_path: impl Into<PathBuf>, content: ContentSource) -> Self {
        Self {
            repo_path: repo_path.into(),
            content,
            staged: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run a git2 closure on a blocking thread with a freshly opened repository.
    async fn with_repo<T, F>(&self, f: F) -> Result<T, GitError>
    where
        T: Send + 'static,
        F: FnOnce(&Repository) -> Result<T, GitError> + Send + 'static,
    {
        let path = self.repo_path.clone();
        tokio::task::spawn_blocking(move || {
            let repo = Repository::open(&path).map_err(GitError::OpenRepository)?;
            f(&repo)
        })
        .await
        .map_err(|e| GitError::TaskFailed(e.to_string()))?
    }
}

#[async_trait]
impl BranchOps for RepoBranchOps {
    async fn create_branch(&self, base: &str, name: &str) -> Result<(), GitError> {
        let base = base.to_string();
        let name = name.to_string();
        self.with_repo(move |repo| {
            let commit = repo
                .revparse_single(&base)
                .and_then(|obj| obj.peel_to_commit())
                .map_err(|e| GitError::ReferenceNotFound(base.clone(), e))?;

            if repo.find_branch(&name, BranchType::Local).is_ok() {
                return Err(GitError::BranchExists(name));
            }
            repo.branch(&name, &commit, false)
                .map_err(|source| GitError::BranchUpdate {
                    branch: name.clone(),
                    source,
                })?;
            debug!("Created branch {} at {}", name, commit.id());
            Ok(())
        })
        .await
    }

    async fn stage_files(&self, branch: &str, paths: &[String]) -> Result<(), GitError> {
        let branch = branch.to_string();
        let paths = paths.to_vec();
        let content = self.content.clone();
        let staged = Arc::clone(&self.staged);

        self.with_repo(move |repo| {
            let update_err = |source| GitError::BranchUpdate {
                branch: branch.clone(),
                source,
            };

            let tip = branch_tip(repo, &branch)?;
            let pending = staged
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&branch)
                .copied();
            let baseline = repo
                .find_tree(pending.unwrap_or_else(|| tip.tree_id()))
                .map_err(update_err)?;

            let mut builder = TreeUpdateBuilder::new();
            match &content {
                ContentSource::Revision(rev) => {
                    let source_tree = repo
                        .revparse_single(rev)
                        .and_then(|obj| obj.peel_to_tree())
                        .map_err(|e| GitError::ReferenceNotFound(rev.clone(), e))?;
                    for path in &paths {
                        match source_tree.get_path(Path::new(path)) {
                            Ok(entry) => {
                                builder.upsert(path.as_str(), entry.id(), tree_mode(entry.filemode()));
                            }
                            Err(e) if e.code() == ErrorCode::NotFound => {
                                remove_if_present(&mut builder, &baseline, path);
                            }
                            Err(e) => return Err(update_err(e)),
                        }
                    }
                }
                ContentSource::WorkingTree => {
                    let workdir = repo.workdir().ok_or(GitError::BareRepository)?;
                    for path in &paths {
                        let full = workdir.join(path);
                        match fs::symlink_metadata(&full) {
                            Ok(meta) if meta.file_type().is_symlink() => {
                                let target = fs::read_link(&full).map_err(|e| GitError::CommandFailed {
                                    operation: "read link".to_string(),
                                    message: e.to_string(),
                                })?;
                                let oid = repo
                                    .blob(target.to_string_lossy().as_bytes())
                                    .map_err(update_err)?;
                                builder.upsert(path.as_str(), oid, FileMode::Link);
                            }
                            Ok(meta) if meta.is_file() => {
                                let oid = repo.blob_path(&full).map_err(update_err)?;
                                builder.upsert(path.as_str(), oid, workdir_mode(&meta));
                            }
                            _ => remove_if_present(&mut builder, &baseline, path),
                        }
                    }
                }
            }

            let tree = builder.create_updated(repo, &baseline).map_err(update_err)?;
            staged
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(branch.clone(), tree);
            debug!("Staged {} paths for {}", paths.len(), branch);
            Ok(())
        })
        .await
    }

    async fn commit(&self, branch: &str, message: &str) -> Result<String, GitError> {
        let branch = branch.to_string();
        let message = message.to_string();
        let staged = Arc::clone(&self.staged);

        self.with_repo(move |repo| {
            let tree_id = staged
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&branch)
                .ok_or_else(|| GitError::NothingStaged(branch.clone()))?;

            let parent = branch_tip(repo, &branch)?;
            if parent.tree_id() == tree_id {
                return Err(GitError::NothingStaged(branch));
            }

            let update_err = |source| GitError::BranchUpdate {
                branch: branch.clone(),
                source,
            };
            let tree = repo.find_tree(tree_id).map_err(update_err)?;
            let sig = repo.signature().map_err(GitError::ConfigError)?;
            let refname = format!("refs/heads/{branch}");
            let oid = repo
                .commit(Some(&refname), &sig, &sig, &message, &tree, &[&parent])
                .map_err(update_err)?;
            debug!("Committed {} on {}", oid, branch);
            Ok(oid.to_string())
        })
        .await
    }

    async fn push(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        if which::which("git").is_err() {
            return Err(GitError::GitNotInstalled);
        }

        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        let args = ["push", "--set-upstream", remote, refspec.as_str()];
        let repo_path = self.repo_path.as_path();

        retry_with_backoff(
            &format!("push {branch}"),
            || run_git(repo_path, &args, "push"),
            |e| matches!(e, GitError::CommandFailed { .. }),
            |e| GitError::RetriesExhausted(Box::new(e)),
        )
        .await
        .map(|_| ())
    }

    async fn delete_branch(&self, name: &str) -> Result<(), GitError> {
        let name = name.to_string();
        let staged = Arc::clone(&self.staged);

        self.with_repo(move |repo| {
            staged
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&name);

            let mut branch = match repo.find_branch(&name, BranchType::Local) {
                Ok(b) => b,
                Err(e) if e.code() == ErrorCode::NotFound => return Ok(()),
                Err(e) => return Err(GitError::ReferenceNotFound(name, e)),
            };
            branch.delete().map_err(|source| GitError::BranchUpdate {
                branch: name.clone(),
                source,
            })?;
            debug!("Deleted branch {}", name);
            Ok(())
        })
        .await
    }
}

fn branch_tip<'r>(repo: &'r Repository, name: &str) -> Result<Commit<'r>, GitError> {
    repo.find_branch(name, BranchType::Local)
        .and_then(|b| b.get().peel_to_commit())
        .map_err(|e| GitError::ReferenceNotFound(name.to_string(), e))
}

/// Removing an entry that is not in the tree is an error in libgit2.
fn remove_if_present(builder: &mut TreeUpdateBuilder, baseline: &Tree<'_>, path: &str) {
    if baseline.get_path(Path::new(path)).is_ok() {
        builder.remove(path);
    }
}

fn tree_mode(filemode: i32) -> FileMode {
    match filemode {
        0o100755 => FileMode::BlobExecutable,
        0o120000 => FileMode::Link,
        0o160000 => FileMode::Commit,
        _ => FileMode::Blob,
    }
}

#[cfg(unix)]
fn workdir_mode(meta: &fs::Metadata) -> FileMode {
    use std::os::unix::fs::PermissionsExt;

    if meta.permissions().mode() & 0o111 != 0 {
        FileMode::BlobExecutable
    } else {
        FileMode::Blob
    }
}

#[cfg(not(unix))]
fn workdir_mode(_meta: &fs::Metadata) -> FileMode {
    FileMode::Blob
}

/// Run a git command in `repo` and return its trimmed stdout.
async fn run_git(repo: &Path, args: &[&str], operation: &str) -> Result<String, GitError> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .output()
        .await
        .map_err(|e| GitError::CommandFailed {
            operation: operation.to_string(),
            message: format!("failed to run git: {e}"),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GitError::CommandFailed {
            operation: operation.to_string(),
            message: stderr.trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
