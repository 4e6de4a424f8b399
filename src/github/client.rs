//! Octocrab client wrapper scoped to a specific repository.
//!
//! This module provides `OctocrabClient`, which wraps an `Octocrab` instance
//! and scopes all operations to a specific repository. Effects are repo-scoped
//! (the `GitHubEffect` enum doesn't include repo info), so a client is built
//! for each push from the repository named in its payload.

use octocrab::Octocrab;

use crate::types::RepoId;
use crate::types::change::branch_name;

/// A GitHub API client scoped to a specific repository.
#[derive(Clone)]
pub struct OctocrabClient {
    /// The underlying octocrab client.
    client: Octocrab,

    /// The repository this client is scoped to.
    repo: RepoId,

    /// Owner used to qualify head filters (`owner:branch`) when listing PRs.
    head_owner: String,
}

impl OctocrabClient {
    /// Creates a new client scoped to the given repository.
    ///
    /// Head filters are qualified with the repository owner.
    pub fn new(client: Octocrab, repo: RepoId) -> Self {
        let head_owner = repo.owner.clone();
        Self {
            client,
            repo,
            head_owner,
        }
    }

    /// Overrides the owner used in PR head filters.
    pub fn with_head_owner(mut self, owner: impl Into<String>) -> Self {
        self.head_owner = owner.into();
        self
    }

    /// Returns a reference to the underlying octocrab client.
    pub fn inner(&self) -> &Octocrab {
        &self.client
    }

    /// Returns the repository this client is scoped to.
    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    /// Returns the repository owner.
    pub fn owner(&self) -> &str {
        &self.repo.owner
    }

    /// Returns the repository name.
    pub fn repo_name(&self) -> &str {
        &self.repo.repo
    }

    /// Builds the `owner:branch` head filter GitHub's PR listing expects.
    pub fn head_filter(&self, head: &str) -> String {
        format!("{}:{}", self.head_owner, branch_name(head))
    }
}

impl std::fmt::Debug for OctocrabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OctocrabClient")
            .field("repo", &self.repo)
            .field("head_owner", &self.head_owner)
            .finish_non_exhaustive()
    }
}
