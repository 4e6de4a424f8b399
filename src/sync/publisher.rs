//! Base ref publishing.
//!
//! A stacked change's PR base is `@base-for/<change ref>`, a branch this
//! service owns. Publishing creates it, or force-moves it when it already
//! exists, so that it points at the parent change's current head.

use std::fmt;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::effects::{GitHubEffect, GitHubInterpreter, GitHubResponse};
use crate::types::{ChangeRef, Sha};

use super::resolver::Resolution;
use super::{CallError, call};

/// The branch a change's PR should target, as published for one push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedBase {
    /// Branch name for the PR base.
    pub branch: String,

    /// True when `@base-for/<ref>` was created or now points at a different
    /// commit than before. Always false for a declared base.
    pub moved: bool,
}

/// Publishing failed and the PR must not be touched this time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    /// Neither creating nor force-updating the base ref worked. `source` is
    /// the update failure; the create failure is logged when it happens.
    #[error("base ref {base_ref} unavailable: {source}")]
    BaseRefUnavailable { base_ref: String, source: CallError },
}

/// Publishes the base for `pushed` and returns the branch its PR should target.
///
/// - [`Resolution::NoStackingParent`]: the declared base, nothing is written
/// - [`Resolution::StackingParent`]: `@base-for/<pushed ref>`, created or
///   force-updated to the parent's head
///
/// Running this twice with the same parent leaves the ref where the first run
/// put it, and the second run reports it as not moved.
#[instrument(skip_all, fields(ref_name = %pushed.full_name()))]
pub async fn publish_base<G>(
    github: &G,
    pushed: &ChangeRef,
    resolution: &Resolution,
) -> Result<PublishedBase, PublishError>
where
    G: GitHubInterpreter,
    G::Error: fmt::Display,
{
    let parent = match resolution {
        Resolution::NoStackingParent => {
            debug!(base = %pushed.name.declared_base, "Using declared base");
            return Ok(PublishedBase {
                branch: pushed.name.declared_base.clone(),
                moved: false,
            });
        }
        Resolution::StackingParent(parent) => parent,
    };

    let base_ref = pushed.name.base_for_ref();
    let target = &parent.head_commit;

    let moved = match create_ref(github, &base_ref, target).await {
        Ok(true) => {
            info!(base_ref = %base_ref, target = %target.short(), "Created base ref");
            return Ok(PublishedBase {
                branch: pushed.name.base_for_branch(),
                moved: true,
            });
        }
        Ok(false) => match current_target(github, &base_ref).await {
            Ok(current) => {
                debug!(base_ref = %base_ref, current = ?current, "Base ref exists");
                current.as_ref() != Some(target)
            }
            Err(e) => {
                debug!(base_ref = %base_ref, error = %e, "Could not read base ref target");
                true
            }
        },
        Err(e) => {
            warn!(base_ref = %base_ref, error = %e, "Creating base ref failed, trying update");
            true
        }
    };

    match force_update_ref(github, &base_ref, target).await {
        Ok(()) => {
            info!(base_ref = %base_ref, target = %target.short(), moved, "Updated base ref");
            Ok(PublishedBase {
                branch: pushed.name.base_for_branch(),
                moved,
            })
        }
        Err(source) => Err(PublishError::BaseRefUnavailable { base_ref, source }),
    }
}

/// The commit `name` points at, or `None` if no such ref is listed.
async fn current_target<G>(github: &G, name: &str) -> Result<Option<Sha>, CallError>
where
    G: GitHubInterpreter,
    G::Error: fmt::Display,
{
    let effect = GitHubEffect::ListMatchingRefs {
        prefix: name.strip_prefix("refs/").unwrap_or(name).to_string(),
    };
    match call(github, effect).await? {
        GitHubResponse::Refs(refs) => Ok(refs
            .into_iter()
            .find(|listed| listed.name == name)
            .map(|listed| listed.sha)),
        other => Err(CallError::unexpected("refs", &other)),
    }
}

/// Returns `Ok(true)` when created and `Ok(false)` when the ref already exists.
async fn create_ref<G>(github: &G, name: &str, sha: &Sha) -> Result<bool, CallError>
where
    G: GitHubInterpreter,
    G::Error: fmt::Display,
{
    let effect = GitHubEffect::CreateRef {
        name: name.to_string(),
        sha: sha.clone(),
    };
    match call(github, effect).await? {
        GitHubResponse::RefCreated => Ok(true),
        GitHubResponse::RefAlreadyExists => Ok(false),
        other => Err(CallError::unexpected("ref_created", &other)),
    }
}

async fn force_update_ref<G>(github: &G, name: &str, sha: &Sha) -> Result<(), CallError>
where
    G: GitHubInterpreter,
    G::Error: fmt::Display,
{
    let effect = GitHubEffect::UpdateRef {
        name: name.to_string(),
        sha: sha.clone(),
        force: true,
    };
    match call(github, effect).await? {
        GitHubResponse::RefUpdated => Ok(()),
        other => Err(CallError::unexpected("ref_updated", &other)),
    }
}
