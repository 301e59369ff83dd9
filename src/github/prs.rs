//! Pull request creation via octocrab.

use std::collections::BTreeSet;

use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::GitHubError;
use crate::plan::DescribedPlan;

/// What to open on GitHub for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestSpec {
    pub head: String,
    pub base: String,
    pub title: String,
    pub body: String,
    pub draft: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPullRequest {
    pub number: u64,
    pub url: String,
}

/// Result of opening the pull request for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PullRequestOutcome {
    Created {
        group_id: usize,
        head: String,
        base: String,
        number: u64,
        url: String,
    },
    Failed {
        group_id: usize,
        head: String,
        message: String,
    },
}

impl PullRequestOutcome {
    pub fn group_id(&self) -> usize {
        match self {
            PullRequestOutcome::Created { group_id, .. } | PullRequestOutcome::Failed { group_id, .. } => {
                *group_id
            }
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, PullRequestOutcome::Created { .. })
    }
}

/// Build an authenticated client.
pub fn client_with_token(token: &str) -> Result<Octocrab, GitHubError> {
    Octocrab::builder()
        .personal_token(token.to_string())
        .build()
        .map_err(|e| GitHubError::CreatePR(Box::new(e)))
}

/// Open one pull request using a pre-configured octocrab client.
///
/// Not retried: a timed-out POST may still have created the PR.
pub async fn create_pull_request(
    octocrab: &Octocrab,
    owner: &str,
    repo: &str,
    spec: &PullRequestSpec,
) -> Result<CreatedPullRequest, GitHubError> {
    let result = octocrab
        .pulls(owner, repo)
        .create(spec.title.as_str(), spec.head.as_str(), spec.base.as_str())
        .body(spec.body.as_str())
        .draft(spec.draft)
        .send()
        .await;

    match result {
        Ok(pr) => Ok(CreatedPullRequest {
            number: pr.number,
            url: pr.html_url.map(|u| u.to_string()).unwrap_or(pr.url),
        }),
        Err(e) => Err(classify_error(e, owner, repo, &spec.head)),
    }
}

/// Map octocrab failures onto the cases callers act on.
///
/// Both Display and Debug output are inspected; octocrab surfaces GitHub's
/// message in different places depending on the failure.
fn classify_error(e: octocrab::Error, owner: &str, repo: &str, head: &str) -> GitHubError {
    let err_display = e.to_string();
    let err_debug = format!("{:?}", e);
    let err_lower = err_display.to_lowercase();
    let debug_lower = err_debug.to_lowercase();

    if err_lower.contains("rate limit") || debug_lower.contains("rate limit") {
        return GitHubError::RateLimited {
            reset_time: "unknown".to_string(),
        };
    }
    if err_display.contains("Not Found") || err_debug.contains("Not Found") {
        return GitHubError::RepositoryNotFound {
            owner: owner.to_string(),
            repo: repo.to_string(),
        };
    }
    if let octocrab::Error::GitHub { source, .. } = &e
        && source.message.contains("Validation Failed")
    {
        let details = source
            .errors
            .as_ref()
            .map(|errors| {
                errors
                    .iter()
                    .filter_map(|err| err.get("message").and_then(|m| m.as_str()))
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| source.message.clone());
        return GitHubError::Rejected {
            head: head.to_string(),
            message: details,
        };
    }
    GitHubError::CreatePR(Box::new(e))
}

/// Open pull requests for the selected groups, in merge order.
///
/// With `chain`, each PR targets the branch of the group before it in merge
/// order; otherwise every PR targets the plan's base branch. Failures are
/// recorded per group and do not stop the remaining groups.
pub async fn open_pull_requests(
    octocrab: &Octocrab,
    owner: &str,
    repo: &str,
    described: &DescribedPlan,
    groups: &BTreeSet<usize>,
    chain: bool,
    draft: bool,
) -> Vec<PullRequestOutcome> {
    let mut outcomes = Vec::new();
    let mut previous_branch: Option<&str> = None;

    for description in &described.descriptions {
        let base = match (chain, previous_branch) {
            (true, Some(branch)) => branch.to_string(),
            _ => described.plan.base_branch.clone(),
        };
        previous_branch = Some(description.branch_name.as_str());

        if !groups.contains(&description.group_id) {
            continue;
        }

        let spec = PullRequestSpec {
            head: description.branch_name.clone(),
            base: base.clone(),
            title: description.title.clone(),
            body: description.body.clone(),
            draft,
        };

        match create_pull_request(octocrab, owner, repo, &spec).await {
            Ok(pr) => {
                info!("Opened PR #{} for {}", pr.number, spec.head);
                outcomes.push(PullRequestOutcome::Created {
                    group_id: description.group_id,
                    head: spec.head,
                    base,
                    number: pr.number,
                    url: pr.url,
                });
            }
            Err(e) => {
                warn!("Failed to open PR for {}: {}", spec.head, e);
                outcomes.push(PullRequestOutcome::Failed {
                    group_id: description.group_id,
                    head: spec.head,
                    message: e.to_string(),
                });
            }
        }
    }

    outcomes
}

/// Extract owner and repo from a git remote URL.
pub fn parse_github_remote(url: &str) -> Result<(String, String), GitHubError> {
    let url = url.trim();

    // SSH: git@github.com:owner/repo.git or ssh://git@github.com/owner/repo.git
    if let Some(path) = url.strip_prefix("git@github.com:") {
        return parse_owner_repo_path(path);
    }

    // HTTPS: https://github.com/owner/repo(.git)
    if let Some((_, path)) = url.split_once("github.com/") {
        return parse_owner_repo_path(path);
    }

    Err(GitHubError::InvalidRepositoryUrl)
}

fn parse_owner_repo_path(path: &str) -> Result<(String, String), GitHubError> {
    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let mut parts = path.split('/');

    match (parts.next(), parts.next()) {
        (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(GitHubError::InvalidRepositoryUrl),
    }
}
