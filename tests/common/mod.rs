//! Shared test utilities for integration tests.
//!
//! Not all functions are used by every test file, but they're shared across tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use git2::{IndexAddOption, Oid, Repository, Signature};

use splitpr::inventory::FileInput;
use splitpr::plan::{DescribeOptions, DescribedPlan, PlanConfig, PlanRequest, describe_plan, generate_plan};

/// A test git repository builder for integration tests.
pub struct TestRepo {
    pub dir: tempfile::TempDir,
    pub repo: Repository,
}

impl TestRepo {
    /// Create a new empty git repository on an unborn `main` branch.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let repo = Repository::init(dir.path()).expect("Failed to init git repo");
        {
            let mut config = repo.config().expect("Failed to open repo config");
            config.set_str("user.name", "Test User").expect("Failed to set user.name");
            config
                .set_str("user.email", "test@example.com")
                .expect("Failed to set user.email");
        }
        repo.set_head("refs/heads/main").expect("Failed to point HEAD at main");
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Get the test signature for commits.
    fn signature(&self) -> Signature<'_> {
        Signature::now("Test User", "test@example.com").expect("Failed to create signature")
    }

    /// Write a file relative to the repository root, creating parent directories.
    pub fn write_file(&self, path: &str, content: &str) {
        let full = self.dir.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&full, content).expect("Failed to write file");
    }

    pub fn remove_file(&self, path: &str) {
        std::fs::remove_file(self.dir.path().join(path)).expect("Failed to remove file");
    }

    pub fn read_file(&self, path: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(path)).expect("Failed to read file")
    }

    /// Stage everything in the working tree (including deletions) and commit on HEAD.
    pub fn commit_all(&self, message: &str) -> Oid {
        let sig = self.signature();

        let mut index = self.repo.index().expect("Failed to get index");
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .expect("Failed to add files");
        index.update_all(["*"].iter(), None).expect("Failed to update index");
        index.write().expect("Failed to write index");
        let tree_id = index.write_tree().expect("Failed to write tree");
        let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");

        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .expect("Failed to create commit")
    }

    /// Create a branch pointing to the given OID.
    pub fn branch(&self, name: &str, oid: Oid) {
        let commit = self.repo.find_commit(oid).expect("Failed to find commit");
        self.repo.branch(name, &commit, false).expect("Failed to create branch");
    }

    /// Point HEAD at a local branch and check it out.
    pub fn checkout(&self, name: &str) {
        let refname = format!("refs/heads/{name}");
        let target = self
            .repo
            .revparse_single(&refname)
            .expect("Branch not found");
        self.repo
            .checkout_tree(&target, Some(git2::build::CheckoutBuilder::new().force()))
            .expect("Failed to checkout");
        self.repo.set_head(&refname).expect("Failed to set HEAD");
    }

    /// Name of the branch HEAD points to.
    pub fn head_branch(&self) -> String {
        self.repo
            .head()
            .expect("Failed to read HEAD")
            .shorthand()
            .expect("HEAD has no name")
            .to_string()
    }

    /// Paths in the tree of a local branch tip, sorted.
    pub fn branch_paths(&self, name: &str) -> Vec<String> {
        let tree = self
            .repo
            .find_branch(name, git2::BranchType::Local)
            .expect("Branch not found")
            .get()
            .peel_to_tree()
            .expect("Failed to peel branch to tree");

        let mut paths = Vec::new();
        tree.walk(git2::TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(git2::ObjectType::Blob) {
                paths.push(format!("{}{}", root, entry.name().unwrap_or_default()));
            }
            git2::TreeWalkResult::Ok
        })
        .expect("Failed to walk tree");
        paths.sort();
        paths
    }

    /// Content of a file at the tip of a local branch.
    pub fn branch_file(&self, name: &str, path: &str) -> Option<String> {
        let tree = self
            .repo
            .find_branch(name, git2::BranchType::Local)
            .ok()?
            .get()
            .peel_to_tree()
            .ok()?;
        let entry = tree.get_path(Path::new(path)).ok()?;
        let blob = self.repo.find_blob(entry.id()).ok()?;
        Some(String::from_utf8_lossy(blob.content()).to_string())
    }

    pub fn branch_exists(&self, name: &str) -> bool {
        self.repo.find_branch(name, git2::BranchType::Local).is_ok()
    }
}

/// A bare repository usable as a push target.
pub fn bare_remote() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let path = dir.path().join("remote.git");
    Repository::init_bare(&path).expect("Failed to init bare repo");
    (dir, path)
}

/// File inputs with the given line counts.
pub fn inputs(files: &[(&str, u64)]) -> Vec<FileInput> {
    files.iter().map(|(path, lines)| FileInput::new(*path, *lines)).collect()
}

/// Generate and describe a plan with default tuning.
pub fn described_plan(files: &[(&str, u64)], target_count: usize, strategy: &str) -> DescribedPlan {
    let request = PlanRequest {
        files: inputs(files),
        target_count,
        strategy: strategy.to_string(),
        dependencies: None,
        base_branch: "main".to_string(),
    };
    let plan = generate_plan(&request, &PlanConfig::default()).expect("Failed to generate plan");
    describe_plan(&plan, &DescribeOptions::default())
}
