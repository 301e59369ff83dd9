//! GitHub token discovery.
//!
//! Lookup order:
//! 1. `gh auth token` when the gh CLI is logged in
//! 2. `GITHUB_TOKEN`
//! 3. `GH_TOKEN`

use std::env;
use std::process::Command;

use tracing::debug;

use crate::error::GitHubError;

const TOKEN_ENV_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

/// Get a GitHub token from the gh CLI or the environment.
pub fn get_github_token() -> Result<String, GitHubError> {
    if let Some(token) = token_from_gh_cli() {
        debug!("Using GitHub token from gh CLI");
        return Ok(token);
    }
    token_from_env().ok_or(GitHubError::AuthenticationFailed)
}

/// First non-empty token among the supported environment variables.
pub fn token_from_env() -> Option<String> {
    TOKEN_ENV_VARS.iter().find_map(|name| match env::var(name) {
        Ok(token) if !token.trim().is_empty() => {
            debug!("Using GitHub token from {}", name);
            Some(token.trim().to_string())
        }
        _ => None,
    })
}

fn token_from_gh_cli() -> Option<String> {
    if which::which("gh").is_err() {
        return None;
    }

    let status = Command::new("gh").args(["auth", "status"]).output().ok()?;
    if !status.status.success() {
        return None;
    }

    let output = Command::new("gh").args(["auth", "token"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!token.is_empty()).then_some(token)
}
