//! GitHub API effect types.
//!
//! These types describe GitHub API operations as data, without executing them.
//! The interpreter in `crate::github` executes these effects against the real
//! GitHub API; tests execute them against an in-memory fake.

use serde::{Deserialize, Serialize};

use crate::types::{PrNumber, PrState, Sha};

/// A GitHub API effect.
///
/// Each variant describes one GitHub API operation. Effects are repo-scoped:
/// the interpreter is constructed with a `RepoId`, so effects don't include it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GitHubEffect {
    // ─── Refs and Commits ─────────────────────────────────────────────────────
    /// List every ref whose name starts with `refs/<prefix>`.
    ListMatchingRefs { prefix: String },

    /// Fetch a commit's parents and message.
    GetCommit { sha: Sha },

    /// Create a ref. `name` is the full ref (`refs/heads/...`).
    CreateRef { name: String, sha: Sha },

    /// Move an existing ref. `name` is the full ref (`refs/heads/...`).
    UpdateRef { name: String, sha: Sha, force: bool },

    // ─── Pull Requests ────────────────────────────────────────────────────────
    /// List pull requests in any state whose head is `head` (a branch or full
    /// ref name).
    ///
    /// The interpreter qualifies the head with an owner, as GitHub requires.
    ListPullRequests { head: String },

    /// Open a new pull request.
    CreatePullRequest {
        head: String,
        base: String,
        title: String,
    },

    /// Change a pull request's base, reopen it, or both. A `None` base is left
    /// alone.
    UpdatePullRequest {
        pr: PrNumber,
        base: Option<String>,
        reopen: bool,
    },
}

impl GitHubEffect {
    /// Returns true if the effect only reads platform state.
    ///
    /// Reads are retried on transient failures; mutations are not retried
    /// within a single push's handling.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            GitHubEffect::ListMatchingRefs { .. }
                | GitHubEffect::GetCommit { .. }
                | GitHubEffect::ListPullRequests { .. }
        )
    }
}

// ─── Response Types ───────────────────────────────────────────────────────────

/// A ref and the object it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefData {
    /// The full ref name, e.g. `refs/heads/@changes/main/alice/topic`.
    pub name: String,
    pub sha: Sha,
}

/// Commit data returned from the git database API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitData {
    pub sha: Sha,
    /// Parent SHAs in order; empty for a root commit.
    pub parents: Vec<Sha>,
    pub message: String,
}

/// PR data returned from the GitHub API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrData {
    /// The PR number.
    pub number: PrNumber,
    /// The head branch name.
    pub head_ref: String,
    /// The base branch name.
    pub base_ref: String,
    /// The PR state (open, closed, merged).
    pub state: PrState,
    pub title: String,
}

/// Response from a GitHub effect.
///
/// Each variant corresponds to the response from a particular effect type.
/// Expected "negative" answers are variants rather than errors, so callers
/// match on them instead of inspecting error messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GitHubResponse {
    /// Response to `ListMatchingRefs`.
    Refs(Vec<RefData>),

    /// Response to `GetCommit`.
    Commit(CommitData),

    /// Response to `GetCommit` when GitHub has no such commit.
    CommitNotFound,

    /// Response to `CreateRef`.
    RefCreated,

    /// Response to `CreateRef` when the ref already exists.
    RefAlreadyExists,

    /// Response to `UpdateRef`.
    RefUpdated,

    /// Response to `ListPullRequests`.
    PrList(Vec<PrData>),

    /// Response to `CreatePullRequest`.
    PrCreated(PrData),

    /// Response to `UpdatePullRequest`.
    PrUpdated(PrData),
}

impl GitHubResponse {
    /// Returns the variant name, for error reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            GitHubResponse::Refs(_) => "refs",
            GitHubResponse::Commit(_) => "commit",
            GitHubResponse::CommitNotFound => "commit_not_found",
            GitHubResponse::RefCreated => "ref_created",
            GitHubResponse::RefAlreadyExists => "ref_already_exists",
            GitHubResponse::RefUpdated => "ref_updated",
            GitHubResponse::PrList(_) => "pr_list",
            GitHubResponse::PrCreated(_) => "pr_created",
            GitHubResponse::PrUpdated(_) => "pr_updated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha() -> Sha {
        Sha::parse("a".repeat(40)).unwrap()
    }

    #[test]
    fn reads_are_read_only() {
        assert!(
            GitHubEffect::ListMatchingRefs {
                prefix: "heads/@changes".into()
            }
            .is_read_only()
        );
        assert!(GitHubEffect::GetCommit { sha: sha() }.is_read_only());
        assert!(
            GitHubEffect::ListPullRequests { head: "x".into() }.is_read_only()
        );
    }

    #[test]
    fn mutations_are_not_read_only() {
        assert!(
            !GitHubEffect::CreateRef {
                name: "refs/heads/x".into(),
                sha: sha()
            }
            .is_read_only()
        );
        assert!(
            !GitHubEffect::UpdateRef {
                name: "refs/heads/x".into(),
                sha: sha(),
                force: true
            }
            .is_read_only()
        );
        assert!(
            !GitHubEffect::CreatePullRequest {
                head: "x".into(),
                base: "main".into(),
                title: String::new()
            }
            .is_read_only()
        );
        assert!(
            !GitHubEffect::UpdatePullRequest {
                pr: PrNumber(1),
                base: None,
                reopen: true
            }
            .is_read_only()
        );
    }

    #[test]
    fn effect_serializes_with_type_tag() {
        let effect = GitHubEffect::GetCommit { sha: sha() };
        let json = serde_json::to_value(&effect).unwrap();
        assert_eq!(json["type"], "get_commit");
        assert_eq!(json["sha"], "a".repeat(40));
    }
}
