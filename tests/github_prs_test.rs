//! Integration tests for GitHub PR creation with mocked octocrab.

mod common;

use std::collections::BTreeSet;

use common::described_plan;
use octocrab::Octocrab;
use serde_json::{Map, Value, json};
use splitpr::error::GitHubError;
use splitpr::github::{PullRequestOutcome, PullRequestSpec, create_pull_request, open_pull_requests};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create an octocrab client pointing to a mock server.
async fn mock_client(server: &MockServer) -> Octocrab {
    Octocrab::builder()
        .base_uri(server.uri())
        .expect("Failed to set base URI")
        .build()
        .expect("Failed to build octocrab")
}

/// Create a mock user object with all fields GitHub API returns.
fn mock_user(login: &str, id: u64) -> Value {
    let api = format!("https://api.github.com/users/{login}");
    let mut user = Map::new();
    user.insert("login".into(), json!(login));
    user.insert("id".into(), json!(id));
    user.insert("node_id".into(), json!(format!("U_{id}")));
    user.insert("avatar_url".into(), json!(format!("https://avatars.githubusercontent.com/u/{id}?v=4")));
    user.insert("gravatar_id".into(), json!(""));
    user.insert("url".into(), json!(api));
    user.insert("html_url".into(), json!(format!("https://github.com/{login}")));
    for (key, suffix) in [
        ("followers_url", "/followers"),
        ("following_url", "/following{/other_user}"),
        ("gists_url", "/gists{/gist_id}"),
        ("starred_url", "/starred{/owner}{/repo}"),
        ("subscriptions_url", "/subscriptions"),
        ("organizations_url", "/orgs"),
        ("repos_url", "/repos"),
        ("events_url", "/events{/privacy}"),
        ("received_events_url", "/received_events"),
    ] {
        user.insert(key.into(), json!(format!("{api}{suffix}")));
    }
    user.insert("type".into(), json!("User"));
    user.insert("site_admin".into(), json!(false));
    Value::Object(user)
}

/// A freshly opened PR as returned by `POST /repos/{owner}/{repo}/pulls`.
fn mock_created_pr(number: u64, head: &str, base: &str, draft: bool) -> Value {
    let api = format!("https://api.github.com/repos/owner/repo/pulls/{number}");
    let html = format!("https://github.com/owner/repo/pull/{number}");

    let mut pr = Map::new();
    pr.insert("url".into(), json!(api));
    pr.insert("id".into(), json!(number * 1000));
    pr.insert("node_id".into(), json!(format!("PR_{number}")));
    pr.insert("html_url".into(), json!(html));
    pr.insert("diff_url".into(), json!(format!("{html}.diff")));
    pr.insert("patch_url".into(), json!(format!("{html}.patch")));
    pr.insert("number".into(), json!(number));
    pr.insert("state".into(), json!("open"));
    pr.insert("locked".into(), json!(false));
    pr.insert("title".into(), json!(format!("PR {number}")));
    pr.insert("body".into(), json!("body"));
    pr.insert("user".into(), mock_user("splitter", 100));
    pr.insert("labels".into(), json!([]));
    pr.insert("assignees".into(), json!([]));
    pr.insert("requested_reviewers".into(), json!([]));
    pr.insert("created_at".into(), json!("2024-01-01T00:00:00Z"));
    pr.insert("updated_at".into(), json!("2024-01-01T00:00:00Z"));
    pr.insert(
        "head".into(),
        json!({ "label": format!("owner:{head}"), "ref": head, "sha": "abc123def456789" }),
    );
    pr.insert(
        "base".into(),
        json!({ "label": format!("owner:{base}"), "ref": base, "sha": "def456abc789" }),
    );
    pr.insert("draft".into(), json!(draft));
    pr.insert("merged".into(), json!(false));
    pr.insert("comments".into(), json!(0));
    pr.insert("commits".into(), json!(1));
    pr.insert("additions".into(), json!(10));
    pr.insert("deletions".into(), json!(2));
    pr.insert("changed_files".into(), json!(1));
    Value::Object(pr)
}

fn spec(head: &str) -> PullRequestSpec {
    PullRequestSpec {
        head: head.to_string(),
        base: "main".to_string(),
        title: "[Split PR 1/2] api module".to_string(),
        body: "## Summary".to_string(),
        draft: true,
    }
}

const PLAN_FILES: &[(&str, u64)] = &[
    ("api/a.py", 10),
    ("api/b.py", 20),
    ("db/c.sql", 10),
    ("db/d.sql", 5),
    ("ui/e.ts", 30),
    ("ui/f.ts", 10),
];

// =============================================================================
// SINGLE PR TESTS
// =============================================================================

#[tokio::test]
async fn test_create_pull_request_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/owner/repo/pulls"))
        .and(body_partial_json(json!({
            "head": "split-01-api",
            "base": "main",
            "title": "[Split PR 1/2] api module",
            "draft": true
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(mock_created_pr(42, "split-01-api", "main", true)))
        .expect(1)
        .mount(&server)
        .await;

    let client = mock_client(&server).await;
    let created = create_pull_request(&client, "owner", "repo", &spec("split-01-api"))
        .await
        .unwrap();

    assert_eq!(created.number, 42);
    assert_eq!(created.url, "https://github.com/owner/repo/pull/42");
}

#[tokio::test]
async fn test_validation_failed_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/owner/repo/pulls"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "Validation Failed",
            "errors": [{
                "resource": "PullRequest",
                "code": "custom",
                "message": "A pull request already exists for owner:split-01-api."
            }],
            "documentation_url": "https://docs.github.com/rest/pulls/pulls#create-a-pull-request"
        })))
        .mount(&server)
        .await;

    let client = mock_client(&server).await;
    let result = create_pull_request(&client, "owner", "repo", &spec("split-01-api")).await;

    match result.unwrap_err() {
        GitHubError::Rejected { head, message } => {
            assert_eq!(head, "split-01-api");
            assert!(message.contains("already exists"), "message was {message}");
        }
        other => panic!("Expected Rejected error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rate_limit_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/owner/repo/pulls"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "message": "API rate limit exceeded for user",
            "documentation_url": "https://docs.github.com/rest/overview/resources-in-the-rest-api#rate-limiting"
        })))
        .mount(&server)
        .await;

    let client = mock_client(&server).await;
    let result = create_pull_request(&client, "owner", "repo", &spec("split-01-api")).await;

    match result.unwrap_err() {
        GitHubError::RateLimited { .. } => {}
        other => panic!("Expected RateLimited error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_repository_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/repos/owner/nonexistent/pulls"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "Not Found",
            "documentation_url": "https://docs.github.com/rest"
        })))
        .mount(&server)
        .await;

    let client = mock_client(&server).await;
    let result = create_pull_request(&client, "owner", "nonexistent", &spec("split-01-api")).await;

    match result.unwrap_err() {
        GitHubError::RepositoryNotFound { owner, repo } => {
            assert_eq!(owner, "owner");
            assert_eq!(repo, "nonexistent");
        }
        other => panic!("Expected RepositoryNotFound error, got {:?}", other),
    }
}

// =============================================================================
// PLAN TESTS
// =============================================================================

#[tokio::test]
async fn test_chained_prs_target_previous_branch() {
    let server = MockServer::start().await;
    let plan = described_plan(PLAN_FILES, 3, "by_module");

    let mut expected_base = plan.plan.base_branch.clone();
    for (i, description) in plan.descriptions.iter().enumerate() {
        let head = description.branch_name.as_str();
        Mock::given(method("POST"))
            .and(path("/repos/owner/repo/pulls"))
            .and(body_partial_json(json!({ "head": head, "base": expected_base, "draft": true })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(mock_created_pr(i as u64 + 1, head, &expected_base, true)),
            )
            .expect(1)
            .mount(&server)
            .await;
        expected_base = head.to_string();
    }

    let client = mock_client(&server).await;
    let all: BTreeSet<usize> = plan.plan.groups.iter().map(|g| g.id).collect();
    let outcomes = open_pull_requests(&client, "owner", "repo", &plan, &all, true, true).await;

    assert_eq!(outcomes.len(), 3);
    for (i, outcome) in outcomes.iter().enumerate() {
        match outcome {
            PullRequestOutcome::Created { number, group_id, .. } => {
                assert_eq!(*number, i as u64 + 1);
                assert_eq!(*group_id, plan.descriptions[i].group_id);
            }
            other => panic!("Expected Created, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_independent_prs_continue_after_failure() {
    let server = MockServer::start().await;
    let plan = described_plan(PLAN_FILES, 3, "by_module");
    let failing = plan.descriptions[1].branch_name.clone();

    Mock::given(method("POST"))
        .and(path("/repos/owner/repo/pulls"))
        .and(body_partial_json(json!({ "head": failing })))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "Validation Failed",
            "errors": [{ "resource": "PullRequest", "code": "custom", "message": "No commits between main and head" }]
        })))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/repos/owner/repo/pulls"))
        .and(body_partial_json(json!({ "base": "main", "draft": false })))
        .respond_with(ResponseTemplate::new(201).set_body_json(mock_created_pr(7, "head", "main", false)))
        .expect(2)
        .mount(&server)
        .await;

    let client = mock_client(&server).await;
    let all: BTreeSet<usize> = plan.plan.groups.iter().map(|g| g.id).collect();
    let outcomes = open_pull_requests(&client, "owner", "repo", &plan, &all, false, false).await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_created());
    assert!(!outcomes[1].is_created());
    assert!(outcomes[2].is_created());
    match &outcomes[1] {
        PullRequestOutcome::Failed { head, message, .. } => {
            assert_eq!(head, &failing);
            assert!(message.contains("No commits"), "message was {message}");
        }
        other => panic!("Expected Failed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_only_selected_groups_are_opened() {
    let server = MockServer::start().await;
    let plan = described_plan(PLAN_FILES, 3, "by_module");
    let selected = plan.descriptions[2].group_id;
    let head = plan.descriptions[2].branch_name.clone();
    let chained_base = plan.descriptions[1].branch_name.clone();

    Mock::given(method("POST"))
        .and(path("/repos/owner/repo/pulls"))
        .and(body_partial_json(json!({ "head": head, "base": chained_base })))
        .respond_with(ResponseTemplate::new(201).set_body_json(mock_created_pr(3, &head, &chained_base, true)))
        .expect(1)
        .mount(&server)
        .await;

    let client = mock_client(&server).await;
    let outcomes = open_pull_requests(&client, "owner", "repo", &plan, &BTreeSet::from([selected]), true, true).await;

    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].group_id(), selected);
    assert!(outcomes[0].is_created());
}
