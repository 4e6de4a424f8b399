//! Ancestry base resolution.
//!
//! A change is stacked on another tracked change when one of its head commit's
//! direct parents is that change's current head. Only one hop is inspected.

use std::fmt;

use tracing::{debug, info, instrument, warn};

use crate::effects::{GitHubEffect, GitHubInterpreter, GitHubResponse};
use crate::types::change::CHANGES_NAMESPACE;
use crate::types::{ChangeRef, Sha};

use super::{CallError, call};

/// Where a pushed change sits in its stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The change sits directly on its declared base.
    NoStackingParent,

    /// The change sits on another tracked change.
    StackingParent(ChangeRef),
}

/// Tracked changes whose head is one of `parents`, ordered by full ref name.
///
/// The caller takes the first entry; any further entries are ties.
pub fn stacking_candidates<'a>(parents: &[Sha], tracked: &'a [ChangeRef]) -> Vec<&'a ChangeRef> {
    let mut candidates: Vec<&ChangeRef> = tracked
        .iter()
        .filter(|change| parents.contains(&change.head_commit))
        .collect();
    candidates.sort_by(|a, b| a.full_name().cmp(b.full_name()));
    candidates
}

/// Finds the tracked change `pushed` is stacked on.
///
/// Lookup failures are logged and resolve to [`Resolution::NoStackingParent`],
/// so the change still gets a pull request against its declared base.
#[instrument(skip_all, fields(ref_name = %pushed.full_name(), head = %pushed.head_commit.short()))]
pub async fn resolve_base<G>(github: &G, pushed: &ChangeRef) -> Resolution
where
    G: GitHubInterpreter,
    G::Error: fmt::Display,
{
    let tracked = match tracked_changes(github, pushed).await {
        Ok(tracked) => tracked,
        Err(e) => {
            warn!(error = %e, "Could not list tracked changes, using declared base");
            return Resolution::NoStackingParent;
        }
    };

    if tracked.is_empty() {
        debug!("No other tracked changes");
        return Resolution::NoStackingParent;
    }

    let parents = match commit_parents(github, &pushed.head_commit).await {
        Ok(Some(parents)) => parents,
        Ok(None) => {
            warn!("Pushed commit not found, using declared base");
            return Resolution::NoStackingParent;
        }
        Err(e) => {
            warn!(error = %e, "Could not fetch pushed commit, using declared base");
            return Resolution::NoStackingParent;
        }
    };

    let candidates = stacking_candidates(&parents, &tracked);
    let Some(parent) = candidates.first() else {
        debug!(
            tracked = tracked.len(),
            parents = parents.len(),
            "No tracked change at a parent commit"
        );
        return Resolution::NoStackingParent;
    };

    if candidates.len() > 1 {
        let names: Vec<&str> = candidates.iter().map(|c| c.full_name()).collect();
        warn!(
            candidates = ?names,
            chosen = %parent.full_name(),
            "Several tracked changes match a parent commit, choosing the first by name"
        );
    }

    info!(parent = %parent.full_name(), "Resolved stacking parent");
    Resolution::StackingParent((*parent).clone())
}

/// Lists every change ref other than `pushed`, which can't be its own parent.
///
/// Matching refs is a plain prefix match, so refs such as
/// `refs/heads/@changes-old/x` come back too and are dropped here.
async fn tracked_changes<G>(github: &G, pushed: &ChangeRef) -> Result<Vec<ChangeRef>, CallError>
where
    G: GitHubInterpreter,
    G::Error: fmt::Display,
{
    let effect = GitHubEffect::ListMatchingRefs {
        prefix: CHANGES_NAMESPACE.to_string(),
    };
    let refs = match call(github, effect).await? {
        GitHubResponse::Refs(refs) => refs,
        other => return Err(CallError::unexpected("refs", &other)),
    };

    Ok(refs
        .into_iter()
        .filter(|r| r.name != pushed.full_name())
        .filter_map(|r| ChangeRef::parse(&r.name, r.sha))
        .collect())
}

/// Returns the commit's parents, or `None` if GitHub doesn't know the commit.
async fn commit_parents<G>(github: &G, sha: &Sha) -> Result<Option<Vec<Sha>>, CallError>
where
    G: GitHubInterpreter,
    G::Error: fmt::Display,
{
    let effect = GitHubEffect::GetCommit { sha: sha.clone() };
    match call(github, effect).await? {
        GitHubResponse::Commit(commit) => Ok(Some(commit.parents)),
        GitHubResponse::CommitNotFound => Ok(None),
        other => Err(CallError::unexpected("commit", &other)),
    }
}
