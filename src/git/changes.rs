//! Changeset collection using git2: the files a split plan is built from.

use std::path::Path;

use git2::{Delta, Diff, DiffFindOptions, DiffOptions, ErrorCode, Oid, Patch, Repository, Tree};
use tracing::debug;

use crate::error::GitError;
use crate::inventory::{ChangeKind, FileInput};

/// Where to read the changeset from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSource {
    /// Staged, unstaged and untracked changes against HEAD.
    WorkingTree,
    /// Changes on `head` since it diverged from `base` (like a PR diff).
    Range { base: String, head: String },
}

/// Collect one [`FileInput`] per changed path, with additions and deletions
/// counted from the patch and the blob size recorded.
pub fn collect_changes(repo: &Repository, source: &ChangeSource) -> Result<Vec<FileInput>, GitError> {
    let mut diff = match source {
        ChangeSource::WorkingTree => working_tree_diff(repo)?,
        ChangeSource::Range { base, head } => range_diff(repo, base, head)?,
    };

    let mut find = DiffFindOptions::new();
    find.renames(true);
    diff.find_similar(Some(&mut find)).map_err(GitError::DiffFailed)?;

    let files = files_from_diff(&diff)?;
    debug!("Collected {} changed files from {:?}", files.len(), source);

    if files.is_empty() {
        return Err(GitError::NoChanges);
    }
    Ok(files)
}

/// Resolve the HEAD tree, distinguishing empty-repo errors from real failures.
///
/// Returns `Ok(None)` for repos with no commits (unborn branch / not found).
fn resolve_head_tree(repo: &Repository) -> Result<Option<Tree<'_>>, GitError> {
    let head_ref = match repo.head() {
        Ok(r) => r,
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
            return Ok(None);
        }
        Err(e) => return Err(GitError::DiffFailed(e)),
    };

    let tree = head_ref.peel_to_tree().map_err(GitError::DiffFailed)?;
    Ok(Some(tree))
}

fn working_tree_diff(repo: &Repository) -> Result<Diff<'_>, GitError> {
    if repo.is_bare() {
        return Err(GitError::BareRepository);
    }
    let head_tree = resolve_head_tree(repo)?;

    let mut opts = DiffOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .show_untracked_content(true);
    repo.diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut opts))
        .map_err(GitError::DiffFailed)
}

fn range_diff<'r>(repo: &'r Repository, base: &str, head: &str) -> Result<Diff<'r>, GitError> {
    let base_oid = resolve_commit(repo, base)?;
    let head_oid = resolve_commit(repo, head)?;

    // Diff from the merge base so commits that landed on `base` later are not counted.
    let fork_point = repo.merge_base(base_oid, head_oid).unwrap_or(base_oid);

    let old_tree = repo
        .find_commit(fork_point)
        .and_then(|c| c.tree())
        .map_err(GitError::DiffFailed)?;
    let new_tree = repo
        .find_commit(head_oid)
        .and_then(|c| c.tree())
        .map_err(GitError::DiffFailed)?;

    repo.diff_tree_to_tree(Some(&old_tree), Some(&new_tree), None)
        .map_err(GitError::DiffFailed)
}

/// Resolve a reference (branch, tag, commit hash) to a commit OID.
pub fn resolve_commit(repo: &Repository, reference: &str) -> Result<Oid, GitError> {
    repo.revparse_single(reference)
        .and_then(|obj| obj.peel_to_commit())
        .map(|commit| commit.id())
        .map_err(|e| GitError::ReferenceNotFound(reference.to_string(), e))
}

fn files_from_diff(diff: &Diff<'_>) -> Result<Vec<FileInput>, GitError> {
    let mut files = Vec::new();

    for (idx, delta) in diff.deltas().enumerate() {
        let change_kind = match delta.status() {
            Delta::Added | Delta::Untracked | Delta::Copied => ChangeKind::Added,
            Delta::Deleted => ChangeKind::Deleted,
            Delta::Renamed => ChangeKind::Renamed,
            Delta::Unmodified | Delta::Ignored => continue,
            _ => ChangeKind::Modified,
        };

        let path_of = |p: Option<&Path>| p.map(|p| p.to_string_lossy().to_string());
        let new_path = path_of(delta.new_file().path());
        let old_path = path_of(delta.old_file().path());

        let (path, old_path) = match change_kind {
            ChangeKind::Renamed => (new_path.clone().or_else(|| old_path.clone()), old_path),
            ChangeKind::Deleted => (old_path.or(new_path), None),
            _ => (new_path.or(old_path), None),
        };
        let Some(path) = path.filter(|p| !p.is_empty()) else {
            continue;
        };

        let (additions, deletions) = match Patch::from_diff(diff, idx).map_err(GitError::DiffFailed)? {
            Some(patch) => {
                let (_, additions, deletions) = patch.line_stats().map_err(GitError::DiffFailed)?;
                (additions as u64, deletions as u64)
            }
            None => (0, 0),
        };

        let size = match change_kind {
            ChangeKind::Deleted => delta.old_file().size(),
            _ => delta.new_file().size(),
        };

        files.push(FileInput {
            path,
            lines: None,
            additions,
            deletions,
            change_kind,
            old_path,
            size_bytes: (size > 0).then_some(size),
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    files.dedup_by(|a, b| a.path == b.path);
    Ok(files)
}
