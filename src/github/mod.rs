//! GitHub API operations using octocrab.

pub mod auth;
pub mod prs;

pub use auth::get_github_token;
pub use prs::{
    CreatedPullRequest, PullRequestOutcome, PullRequestSpec, client_with_token, create_pull_request,
    open_pull_requests, parse_github_remote,
};
