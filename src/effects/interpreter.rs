//! Effect interpreter trait.
//!
//! The sync pipeline only ever talks to GitHub through this trait, which
//! enables:
//! - The octocrab-backed interpreter in production
//! - An in-memory fake that records calls in tests
//! - Logging/tracing of intended operations

use std::future::Future;

use super::github::{GitHubEffect, GitHubResponse};

/// Interprets GitHub effects against the GitHub API.
///
/// Implementations are scoped to one repository, so effects carry no repo.
/// Expected negative answers ("already exists", "not found") come back as
/// [`GitHubResponse`] variants; `Err` means the call itself failed.
pub trait GitHubInterpreter {
    /// The error type returned by this interpreter.
    type Error;

    /// Execute a GitHub effect and return its response.
    fn interpret(
        &self,
        effect: GitHubEffect,
    ) -> impl Future<Output = Result<GitHubResponse, Self::Error>> + Send;
}

impl<T> GitHubInterpreter for std::sync::Arc<T>
where
    T: GitHubInterpreter + Send + Sync,
{
    type Error = T::Error;

    fn interpret(
        &self,
        effect: GitHubEffect,
    ) -> impl Future<Output = Result<GitHubResponse, Self::Error>> + Send {
        (**self).interpret(effect)
    }
}
