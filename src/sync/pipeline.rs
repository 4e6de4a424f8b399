//! One push, end to end.

use std::fmt;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::effects::GitHubInterpreter;
use crate::types::{ChangeRef, PrNumber};
use crate::webhooks::PushEvent;

use super::SyncOptions;
use super::publisher::{PublishError, publish_base};
use super::resolver::resolve_base;
use super::synchronizer::{PrLookup, SyncError, SyncOutcome, find_pull_request, reconcile};

/// Why a push was dropped without any GitHub call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The ref is not `refs/heads/@changes/<base>/<author>/<topic>`.
    NonMatchingRef,

    /// The push deleted the branch.
    BranchDeleted,
}

/// How a push was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Ignored(IgnoreReason),

    /// Several PRs share the change's head branch; nothing was changed.
    AmbiguousPullRequest { numbers: Vec<PrNumber> },

    /// The PR now targets `base`.
    Synced { base: String, pr: SyncOutcome },
}

/// A push that could not be fully handled.
#[derive(Debug, Error)]
pub enum PushError {
    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    PullRequest(#[from] SyncError),
}

/// Handles a push to a change branch.
///
/// The PR lookup runs first so that an ambiguous head aborts before any ref
/// is written. Then the stacking parent is resolved, its base ref published,
/// and the PR reconciled against the published base.
#[instrument(skip_all, fields(repo = %event.repo, ref_name = %event.ref_name, after = %event.after.short()))]
pub async fn handle_push<G>(
    github: &G,
    event: &PushEvent,
    options: &SyncOptions,
) -> Result<PushOutcome, PushError>
where
    G: GitHubInterpreter,
    G::Error: fmt::Display,
{
    if event.deleted || event.after.is_zero() {
        info!("Ignoring branch deletion");
        return Ok(PushOutcome::Ignored(IgnoreReason::BranchDeleted));
    }

    let Some(pushed) = ChangeRef::parse(&event.ref_name, event.after.clone()) else {
        info!("Ignoring push to a ref outside @changes");
        return Ok(PushOutcome::Ignored(IgnoreReason::NonMatchingRef));
    };

    let existing = match find_pull_request(github, &pushed).await? {
        PrLookup::Ambiguous(numbers) => {
            warn!(prs = ?numbers, "Several pull requests for one change, leaving them alone");
            return Ok(PushOutcome::AmbiguousPullRequest { numbers });
        }
        PrLookup::Existing(pr) => Some(pr),
        PrLookup::Absent => None,
    };

    let resolution = resolve_base(github, &pushed).await;
    let published = publish_base(github, &pushed, &resolution).await?;
    let pr = reconcile(github, &pushed, existing, &published, event.title(), options).await?;

    Ok(PushOutcome::Synced {
        base: published.branch,
        pr,
    })
}
