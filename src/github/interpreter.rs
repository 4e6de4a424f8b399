//! GitHub effect interpreter using octocrab.
//!
//! This module implements the `GitHubInterpreter` trait, executing GitHub effects
//! against the real GitHub API via octocrab.
//!
//! Key implementation details:
//! - Git database endpoints (matching refs, commits, refs) are called through
//!   octocrab's raw `get`/`post`/`patch` with typed response structs
//! - "Already exists" and "not found" answers become response variants
//! - Reads retry transient errors; mutations are attempted once

use serde::{Deserialize, Serialize};

use crate::effects::{CommitData, GitHubEffect, GitHubInterpreter, GitHubResponse, PrData, RefData};
use crate::types::change::branch_name;
use crate::types::{PrNumber, PrState, Sha};

use super::client::OctocrabClient;
use super::error::{GitHubApiError, error_message, is_reference_already_exists, status_code};
use super::retry::{RetryConfig, RetryPolicy, retry_with_backoff};

// ─── Interpreter Implementation ───────────────────────────────────────────────

impl GitHubInterpreter for OctocrabClient {
    type Error = GitHubApiError;

    async fn interpret(&self, effect: GitHubEffect) -> Result<GitHubResponse, Self::Error> {
        let policy = RetryPolicy::for_effect(&effect);
        interpret_github_effect(self, effect, RetryConfig::DEFAULT, policy).await
    }
}

/// Interprets a GitHub effect, executing it against the GitHub API.
///
/// This is the main entry point for effect interpretation. It handles retry
/// logic and proper error categorization.
///
/// # Arguments
///
/// * `client` - The octocrab client scoped to a repository
/// * `effect` - The effect to execute
/// * `retry_config` - Configuration for retry behavior
/// * `retry_policy` - Whether to retry transient errors
pub async fn interpret_github_effect(
    client: &OctocrabClient,
    effect: GitHubEffect,
    retry_config: RetryConfig,
    retry_policy: RetryPolicy,
) -> Result<GitHubResponse, GitHubApiError> {
    let result = retry_with_backoff(retry_config, retry_policy, || {
        execute_effect(client, effect.clone())
    })
    .await;

    result.into_result()
}

/// Executes a single effect without retry logic.
async fn execute_effect(
    client: &OctocrabClient,
    effect: GitHubEffect,
) -> Result<GitHubResponse, GitHubApiError> {
    match effect {
        GitHubEffect::ListMatchingRefs { prefix } => list_matching_refs(client, &prefix).await,
        GitHubEffect::GetCommit { sha } => get_commit(client, &sha).await,
        GitHubEffect::CreateRef { name, sha } => create_ref(client, name, sha).await,
        GitHubEffect::UpdateRef { name, sha, force } => update_ref(client, &name, sha, force).await,
        GitHubEffect::ListPullRequests { head } => list_pull_requests(client, &head).await,
        GitHubEffect::CreatePullRequest { head, base, title } => {
            create_pull_request(client, &head, &base, title).await
        }
        GitHubEffect::UpdatePullRequest { pr, base, reopen } => {
            update_pull_request(client, pr, base, reopen).await
        }
    }
}

/// Percent-encodes each segment of a ref path, keeping the `/` separators.
fn encode_ref_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn parse_sha(raw: &str, what: &str) -> Result<Sha, GitHubApiError> {
    Sha::parse(raw).map_err(|e| {
        GitHubApiError::permanent_without_source(format!("Invalid {} in response: {}", what, e))
    })
}

// ─── Refs ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawGitRef {
    #[serde(rename = "ref")]
    ref_name: String,
    object: RawGitObject,
}

#[derive(Debug, Deserialize)]
struct RawGitObject {
    sha: String,
}

async fn list_matching_refs(
    client: &OctocrabClient,
    prefix: &str,
) -> Result<GitHubResponse, GitHubApiError> {
    let url = format!(
        "/repos/{}/{}/git/matching-refs/{}",
        client.owner(),
        client.repo_name(),
        encode_ref_path(prefix)
    );

    let result: Result<Vec<RawGitRef>, _> = client.inner().get(&url, None::<&()>).await;

    match result {
        Ok(raw_refs) => {
            let mut refs = Vec::with_capacity(raw_refs.len());
            for raw in raw_refs {
                match Sha::parse(&raw.object.sha) {
                    Ok(sha) => refs.push(RefData {
                        name: raw.ref_name,
                        sha,
                    }),
                    Err(e) => {
                        tracing::warn!(ref_name = %raw.ref_name, error = %e, "Skipping ref with invalid SHA");
                    }
                }
            }
            Ok(GitHubResponse::Refs(refs))
        }
        Err(e) => Err(GitHubApiError::from_octocrab(e)),
    }
}

#[derive(Serialize)]
struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    ref_name: &'a str,
    sha: &'a str,
}

async fn create_ref(
    client: &OctocrabClient,
    name: String,
    sha: Sha,
) -> Result<GitHubResponse, GitHubApiError> {
    let url = format!("/repos/{}/{}/git/refs", client.owner(), client.repo_name());
    let request = CreateRefRequest {
        ref_name: &name,
        sha: sha.as_str(),
    };

    let result: Result<serde_json::Value, _> = client.inner().post(&url, Some(&request)).await;

    match result {
        Ok(_) => Ok(GitHubResponse::RefCreated),
        Err(e) => {
            if status_code(&e) == Some(422) && is_reference_already_exists(&error_message(&e)) {
                Ok(GitHubResponse::RefAlreadyExists)
            } else {
                Err(GitHubApiError::from_octocrab(e))
            }
        }
    }
}

#[derive(Serialize)]
struct UpdateRefRequest<'a> {
    sha: &'a str,
    force: bool,
}

async fn update_ref(
    client: &OctocrabClient,
    name: &str,
    sha: Sha,
    force: bool,
) -> Result<GitHubResponse, GitHubApiError> {
    // The endpoint takes the ref without its leading "refs/".
    let path = name.strip_prefix("refs/").unwrap_or(name);
    let url = format!(
        "/repos/{}/{}/git/refs/{}",
        client.owner(),
        client.repo_name(),
        encode_ref_path(path)
    );
    let request = UpdateRefRequest {
        sha: sha.as_str(),
        force,
    };

    let result: Result<serde_json::Value, _> = client.inner().patch(&url, Some(&request)).await;

    match result {
        Ok(_) => Ok(GitHubResponse::RefUpdated),
        Err(e) => Err(GitHubApiError::from_octocrab(e)),
    }
}

// ─── Commits ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawCommit {
    sha: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    parents: Vec<RawGitObject>,
}

async fn get_commit(client: &OctocrabClient, sha: &Sha) -> Result<GitHubResponse, GitHubApiError> {
    let url = format!(
        "/repos/{}/{}/git/commits/{}",
        client.owner(),
        client.repo_name(),
        sha
    );

    let result: Result<RawCommit, _> = client.inner().get(&url, None::<&()>).await;

    match result {
        Ok(raw) => {
            let parents = raw
                .parents
                .iter()
                .map(|p| parse_sha(&p.sha, "parent SHA"))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(GitHubResponse::Commit(CommitData {
                sha: parse_sha(&raw.sha, "commit SHA")?,
                parents,
                message: raw.message,
            }))
        }
        // 404 for an unknown object, 422 for one GitHub can't resolve.
        Err(e) if matches!(status_code(&e), Some(404 | 422)) => {
            tracing::debug!(sha = %sha, error = %error_message(&e), "Commit not found");
            Ok(GitHubResponse::CommitNotFound)
        }
        Err(e) => Err(GitHubApiError::from_octocrab(e)),
    }
}

// ─── Pull Requests ────────────────────────────────────────────────────────────

fn pr_data_from(pull: octocrab::models::pulls::PullRequest) -> PrData {
    let state = if pull.merged_at.is_some() {
        PrState::Merged
    } else if pull.state == Some(octocrab::models::IssueState::Closed) {
        PrState::Closed
    } else {
        PrState::Open
    };

    PrData {
        number: PrNumber(pull.number),
        head_ref: pull.head.ref_field,
        base_ref: pull.base.ref_field,
        state,
        title: pull.title.unwrap_or_default(),
    }
}

async fn list_pull_requests(
    client: &OctocrabClient,
    head: &str,
) -> Result<GitHubResponse, GitHubApiError> {
    let head_filter = client.head_filter(head);
    let mut page = 1u32;
    let mut all_prs = Vec::new();

    loop {
        let result = client
            .inner()
            .pulls(client.owner(), client.repo_name())
            .list()
            .head(head_filter.clone())
            .state(octocrab::params::State::All)
            .per_page(100)
            .page(page)
            .send()
            .await;

        match result {
            Ok(page_result) => {
                let items = page_result.items;
                let is_last_page = items.len() < 100;

                all_prs.extend(items.into_iter().map(pr_data_from));

                if is_last_page {
                    break;
                }
                page += 1;
            }
            Err(e) => return Err(GitHubApiError::from_octocrab(e)),
        }
    }

    Ok(GitHubResponse::PrList(all_prs))
}

async fn create_pull_request(
    client: &OctocrabClient,
    head: &str,
    base: &str,
    title: String,
) -> Result<GitHubResponse, GitHubApiError> {
    let result = client
        .inner()
        .pulls(client.owner(), client.repo_name())
        .create(title, branch_name(head), branch_name(base))
        .send()
        .await;

    match result {
        Ok(pull) => Ok(GitHubResponse::PrCreated(pr_data_from(pull))),
        Err(e) => Err(GitHubApiError::from_octocrab(e)),
    }
}

#[derive(Serialize)]
struct UpdatePullRequestBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    base: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'static str>,
}

async fn update_pull_request(
    client: &OctocrabClient,
    pr: PrNumber,
    base: Option<String>,
    reopen: bool,
) -> Result<GitHubResponse, GitHubApiError> {
    let url = format!(
        "/repos/{}/{}/pulls/{}",
        client.owner(),
        client.repo_name(),
        pr.0
    );
    let body = UpdatePullRequestBody {
        base: base.as_deref().map(branch_name),
        state: reopen.then_some("open"),
    };

    let result: Result<octocrab::models::pulls::PullRequest, _> =
        client.inner().patch(&url, Some(&body)).await;

    match result {
        Ok(pull) => Ok(GitHubResponse::PrUpdated(pr_data_from(pull))),
        Err(e) => Err(GitHubApiError::from_octocrab(e)),
    }
}
