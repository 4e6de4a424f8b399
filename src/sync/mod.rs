//! The push-to-pull-request pipeline.
//!
//! A push to `refs/heads/@changes/<base>/<author>/<topic>` flows through:
//!
//! 1. [`resolver`]: find the tracked change the pushed commit sits on
//! 2. [`publisher`]: publish that parent as `@base-for/<ref>` and pick the PR base
//! 3. [`synchronizer`]: create, reopen or retarget the change's pull request
//!
//! [`pipeline::handle_push`] runs the stages in order. Every stage talks to
//! GitHub only through a [`GitHubInterpreter`], and all state is re-read from
//! GitHub on each push.

use std::fmt;

use thiserror::Error;

use crate::effects::{GitHubEffect, GitHubInterpreter, GitHubResponse};

pub mod pipeline;
pub mod publisher;
pub mod resolver;
pub mod synchronizer;

pub use pipeline::{IgnoreReason, PushError, PushOutcome, handle_push};
pub use publisher::{PublishError, PublishedBase, publish_base};
pub use resolver::{Resolution, resolve_base, stacking_candidates};
pub use synchronizer::{PrLookup, SyncError, SyncOutcome, classify_pull_requests};

/// Behaviour switches for the sync pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// When set, every base change first retargets the PR to this branch and
    /// then to the real base. The same round trip runs when the PR's base name
    /// is unchanged but its `@base-for` ref was moved, because GitHub only
    /// recomputes a PR's diff when the base branch name changes.
    pub refresh_base_via: Option<String>,
}

/// Failure of a single GitHub call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    /// The interpreter reported an error.
    #[error("GitHub API error: {0}")]
    GitHub(String),

    /// The interpreter answered with a response for a different effect.
    #[error("unexpected {got} response, expected {expected}")]
    UnexpectedResponse {
        expected: &'static str,
        got: &'static str,
    },
}

impl CallError {
    fn unexpected(expected: &'static str, got: &GitHubResponse) -> Self {
        CallError::UnexpectedResponse {
            expected,
            got: got.kind(),
        }
    }
}

/// Runs one effect, flattening the interpreter's error into a message.
async fn call<G>(github: &G, effect: GitHubEffect) -> Result<GitHubResponse, CallError>
where
    G: GitHubInterpreter,
    G::Error: fmt::Display,
{
    github
        .interpret(effect)
        .await
        .map_err(|e| CallError::GitHub(e.to_string()))
}
