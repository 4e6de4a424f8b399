//! Pull request reconciliation.
//!
//! Each change branch should have exactly one pull request, open and targeting
//! the base the publisher chose. This module looks that PR up and issues the
//! calls needed to get it there.

use std::fmt;

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::effects::{GitHubEffect, GitHubInterpreter, GitHubResponse, PrData};
use crate::types::change::same_branch;
use crate::types::{ChangeRef, PrNumber, PrState};

use super::publisher::PublishedBase;
use super::{CallError, SyncOptions, call};

/// The pull requests found for a change branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrLookup {
    /// No open or closed PR; merged ones don't count.
    Absent,

    /// Exactly one PR to reconcile.
    Existing(PrData),

    /// More than one candidate. Nothing may be changed.
    Ambiguous(Vec<PrNumber>),
}

/// What reconciliation did to the change's PR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Opened a new PR.
    Created(PrNumber),

    /// PR was open with the right base.
    Unchanged(PrNumber),

    /// PR was open and moved to the new base.
    Retargeted(PrNumber),

    /// PR already targeted the base, whose ref moved; it was sent through the
    /// refresh branch and back.
    Refreshed(PrNumber),

    /// PR was closed; it was reopened and moved to the base.
    Reopened(PrNumber),
}

impl SyncOutcome {
    pub fn pr(&self) -> PrNumber {
        match self {
            SyncOutcome::Created(pr)
            | SyncOutcome::Unchanged(pr)
            | SyncOutcome::Retargeted(pr)
            | SyncOutcome::Refreshed(pr)
            | SyncOutcome::Reopened(pr) => *pr,
        }
    }
}

/// A PR call failed. Nothing is retried until the next push.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("listing pull requests for {head} failed: {source}")]
    Lookup { head: String, source: CallError },

    #[error("creating pull request for {head} failed: {source}")]
    Create { head: String, source: CallError },

    #[error("reopening {pr} failed: {source}")]
    Reopen { pr: PrNumber, source: CallError },

    #[error("{pr} is merged and cannot be reopened")]
    Merged { pr: PrNumber },

    #[error("retargeting {pr} onto {base} failed: {source}")]
    Retarget {
        pr: PrNumber,
        base: String,
        source: CallError,
    },
}

/// Picks the PR to reconcile from everything listed for a head branch.
///
/// Merged PRs can't be reopened and are skipped. Open PRs win over closed
/// ones; two or more in the winning group is ambiguous.
pub fn classify_pull_requests(prs: Vec<PrData>) -> PrLookup {
    let (open, closed): (Vec<PrData>, Vec<PrData>) = prs
        .into_iter()
        .filter(|pr| !pr.state.is_merged())
        .partition(|pr| pr.state.is_open());

    let mut tier = if open.is_empty() { closed } else { open };
    match tier.len() {
        0 => PrLookup::Absent,
        1 => PrLookup::Existing(tier.remove(0)),
        _ => PrLookup::Ambiguous(tier.iter().map(|pr| pr.number).collect()),
    }
}

/// Lists the PRs whose head is `pushed` and classifies them.
#[instrument(skip_all, fields(ref_name = %pushed.full_name()))]
pub async fn find_pull_request<G>(github: &G, pushed: &ChangeRef) -> Result<PrLookup, SyncError>
where
    G: GitHubInterpreter,
    G::Error: fmt::Display,
{
    let head = pushed.full_name().to_string();
    let effect = GitHubEffect::ListPullRequests {
        head: head.clone(),
    };

    let prs = match call(github, effect).await {
        Ok(GitHubResponse::PrList(prs)) => prs,
        Ok(other) => {
            return Err(SyncError::Lookup {
                head,
                source: CallError::unexpected("pr_list", &other),
            });
        }
        Err(source) => return Err(SyncError::Lookup { head, source }),
    };

    debug!(found = prs.len(), "Listed pull requests");
    Ok(classify_pull_requests(prs))
}

/// Brings the change's PR in line with `published`.
///
/// `existing` is the PR found by [`find_pull_request`], or `None` when absent.
/// A closed PR is reopened with one call and retargeted with another, in that
/// order, even when its base was already right. An open PR already on the
/// right base is only touched when `refresh_base_via` is set and the base ref
/// moved, since GitHub keeps showing the old diff otherwise.
#[instrument(skip_all, fields(ref_name = %pushed.full_name(), base = %published.branch))]
pub async fn reconcile<G>(
    github: &G,
    pushed: &ChangeRef,
    existing: Option<PrData>,
    published: &PublishedBase,
    title: String,
    options: &SyncOptions,
) -> Result<SyncOutcome, SyncError>
where
    G: GitHubInterpreter,
    G::Error: fmt::Display,
{
    let base = published.branch.as_str();
    let Some(pr) = existing else {
        return create(github, pushed, base, title).await;
    };

    match pr.state {
        PrState::Open if same_branch(&pr.base_ref, base) => {
            if published.moved && needs_refresh(options, base) {
                retarget(github, pr.number, base, options).await?;
                info!(pr = %pr.number, "Refreshed pull request after base moved");
                return Ok(SyncOutcome::Refreshed(pr.number));
            }
            debug!(pr = %pr.number, "Pull request already targets base");
            Ok(SyncOutcome::Unchanged(pr.number))
        }
        PrState::Open => {
            retarget(github, pr.number, base, options).await?;
            info!(pr = %pr.number, from = %pr.base_ref, "Retargeted pull request");
            Ok(SyncOutcome::Retargeted(pr.number))
        }
        PrState::Closed => {
            reopen(github, pr.number).await?;
            retarget(github, pr.number, base, options).await?;
            info!(pr = %pr.number, "Reopened pull request");
            Ok(SyncOutcome::Reopened(pr.number))
        }
        PrState::Merged => Err(SyncError::Merged { pr: pr.number }),
    }
}

/// True when retargeting onto `base` would go through a separate refresh branch.
fn needs_refresh(options: &SyncOptions, base: &str) -> bool {
    options
        .refresh_base_via
        .as_deref()
        .is_some_and(|via| !same_branch(via, base))
}

async fn create<G>(
    github: &G,
    pushed: &ChangeRef,
    base: &str,
    title: String,
) -> Result<SyncOutcome, SyncError>
where
    G: GitHubInterpreter,
    G::Error: fmt::Display,
{
    let head = pushed.full_name().to_string();
    let effect = GitHubEffect::CreatePullRequest {
        head: head.clone(),
        base: base.to_string(),
        title,
    };

    match call(github, effect).await {
        Ok(GitHubResponse::PrCreated(pr)) => {
            info!(pr = %pr.number, "Created pull request");
            Ok(SyncOutcome::Created(pr.number))
        }
        Ok(other) => Err(SyncError::Create {
            head,
            source: CallError::unexpected("pr_created", &other),
        }),
        Err(source) => Err(SyncError::Create { head, source }),
    }
}

async fn reopen<G>(github: &G, pr: PrNumber) -> Result<(), SyncError>
where
    G: GitHubInterpreter,
    G::Error: fmt::Display,
{
    let effect = GitHubEffect::UpdatePullRequest {
        pr,
        base: None,
        reopen: true,
    };
    match call(github, effect).await {
        Ok(GitHubResponse::PrUpdated(_)) => Ok(()),
        Ok(other) => Err(SyncError::Reopen {
            pr,
            source: CallError::unexpected("pr_updated", &other),
        }),
        Err(source) => Err(SyncError::Reopen { pr, source }),
    }
}

/// Points the PR at `base`, going through `refresh_base_via` first if set.
async fn retarget<G>(
    github: &G,
    pr: PrNumber,
    base: &str,
    options: &SyncOptions,
) -> Result<(), SyncError>
where
    G: GitHubInterpreter,
    G::Error: fmt::Display,
{
    if let Some(via) = options.refresh_base_via.as_deref()
        && needs_refresh(options, base)
    {
        set_base(github, pr, via).await?;
    }
    set_base(github, pr, base).await
}

async fn set_base<G>(github: &G, pr: PrNumber, base: &str) -> Result<(), SyncError>
where
    G: GitHubInterpreter,
    G::Error: fmt::Display,
{
    let effect = GitHubEffect::UpdatePullRequest {
        pr,
        base: Some(base.to_string()),
        reopen: false,
    };
    let failed = |source| SyncError::Retarget {
        pr,
        base: base.to_string(),
        source,
    };
    match call(github, effect).await {
        Ok(GitHubResponse::PrUpdated(_)) => Ok(()),
        Ok(other) => Err(failed(CallError::unexpected("pr_updated", &other))),
        Err(source) => Err(failed(source)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeGitHub, sha};

    const PUSHED: &str = "refs/heads/@changes/main/alice/topic";
    const BRANCH: &str = "@changes/main/alice/topic";

    fn pushed() -> ChangeRef {
        ChangeRef::parse(PUSHED, sha(2)).unwrap()
    }

    fn published(branch: &str, moved: bool) -> PublishedBase {
        PublishedBase {
            branch: branch.to_string(),
            moved,
        }
    }

    fn pr(number: u64, state: PrState) -> PrData {
        PrData {
            number: PrNumber(number),
            head_ref: BRANCH.to_string(),
            base_ref: "main".to_string(),
            state,
            title: String::new(),
        }
    }

    #[test]
    fn classify_prefers_open_over_closed() {
        let lookup = classify_pull_requests(vec![pr(1, PrState::Closed), pr(2, PrState::Open)]);
        assert_eq!(lookup, PrLookup::Existing(pr(2, PrState::Open)));
    }

    #[test]
    fn classify_ignores_merged() {
        assert_eq!(
            classify_pull_requests(vec![pr(1, PrState::Merged)]),
            PrLookup::Absent
        );
        assert_eq!(
            classify_pull_requests(vec![pr(1, PrState::Merged), pr(2, PrState::Closed)]),
            PrLookup::Existing(pr(2, PrState::Closed))
        );
    }

    #[test]
    fn classify_flags_duplicates_in_winning_tier() {
        assert_eq!(
            classify_pull_requests(vec![pr(1, PrState::Open), pr(2, PrState::Open)]),
            PrLookup::Ambiguous(vec![PrNumber(1), PrNumber(2)])
        );
        assert_eq!(
            classify_pull_requests(vec![pr(3, PrState::Closed), pr(4, PrState::Closed)]),
            PrLookup::Ambiguous(vec![PrNumber(3), PrNumber(4)])
        );
        assert_eq!(classify_pull_requests(vec![]), PrLookup::Absent);
    }

    #[tokio::test]
    async fn find_uses_fake_listing() {
        let github = FakeGitHub::new();
        let number = github.add_pr(BRANCH, "main", PrState::Open);
        github.add_pr("@changes/main/alice/other", "main", PrState::Open);

        let lookup = find_pull_request(&github, &pushed()).await.unwrap();

        match lookup {
            PrLookup::Existing(found) => assert_eq!(found.number, number),
            other => panic!("expected Existing, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn absent_pr_is_created_with_title() {
        let github = FakeGitHub::new();

        let outcome = reconcile(
            &github,
            &pushed(),
            None,
            &published("main", false),
            "Add topic".to_string(),
            &SyncOptions::default(),
        )
        .await
        .unwrap();

        let created = github.pr(outcome.pr()).unwrap();
        assert!(matches!(outcome, SyncOutcome::Created(_)));
        assert_eq!(created.head_ref, BRANCH);
        assert_eq!(created.base_ref, "main");
        assert_eq!(created.title, "Add topic");
    }

    #[tokio::test]
    async fn open_pr_with_correct_base_is_left_alone() {
        let github = FakeGitHub::new();
        let number = github.add_pr(BRANCH, "main", PrState::Open);
        let existing = github.pr(number);

        let outcome = reconcile(
            &github,
            &pushed(),
            existing,
            &published("refs/heads/main", false),
            String::new(),
            &SyncOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome, SyncOutcome::Unchanged(number));
        assert!(github.calls().is_empty());
    }

    #[tokio::test]
    async fn stale_open_pr_is_retargeted_once() {
        let github = FakeGitHub::new();
        let number = github.add_pr(BRANCH, "main", PrState::Open);
        let existing = github.pr(number);

        let outcome = reconcile(
            &github,
            &pushed(),
            existing,
            &published("@base-for/refs/heads/@changes/main/alice/topic", true),
            String::new(),
            &SyncOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome, SyncOutcome::Retargeted(number));
        assert_eq!(github.calls_of("update_pull_request"), 1);
        assert_eq!(
            github.pr(number).unwrap().base_ref,
            "@base-for/refs/heads/@changes/main/alice/topic"
        );
    }

    #[tokio::test]
    async fn closed_pr_is_reopened_then_retargeted() {
        let github = FakeGitHub::new();
        let number = github.add_pr(BRANCH, "main", PrState::Closed);
        let existing = github.pr(number);

        let outcome = reconcile(
            &github,
            &pushed(),
            existing,
            &published("main", false),
            String::new(),
            &SyncOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome, SyncOutcome::Reopened(number));
        assert_eq!(
            github.mutations(),
            vec![
                GitHubEffect::UpdatePullRequest {
                    pr: number,
                    base: None,
                    reopen: true,
                },
                GitHubEffect::UpdatePullRequest {
                    pr: number,
                    base: Some("main".to_string()),
                    reopen: false,
                },
            ]
        );
        assert!(github.pr(number).unwrap().state.is_open());
    }

    #[tokio::test]
    async fn refresh_goes_through_intermediate_base() {
        let github = FakeGitHub::new();
        let number = github.add_pr(BRANCH, "main", PrState::Open);
        let existing = github.pr(number);
        let options = SyncOptions {
            refresh_base_via: Some("master".to_string()),
        };

        reconcile(
            &github,
            &pushed(),
            existing,
            &published("develop", true),
            String::new(),
            &options,
        )
        .await
        .unwrap();

        let bases: Vec<Option<String>> = github
            .mutations()
            .into_iter()
            .map(|effect| match effect {
                GitHubEffect::UpdatePullRequest { base, .. } => base,
                other => panic!("unexpected mutation {:?}", other),
            })
            .collect();
        assert_eq!(
            bases,
            vec![Some("master".to_string()), Some("develop".to_string())]
        );
    }

    #[tokio::test]
    async fn refresh_skipped_when_base_is_the_intermediate() {
        let github = FakeGitHub::new();
        let number = github.add_pr(BRANCH, "main", PrState::Open);
        let existing = github.pr(number);
        let options = SyncOptions {
            refresh_base_via: Some("master".to_string()),
        };

        reconcile(
            &github,
            &pushed(),
            existing,
            &published("master", true),
            String::new(),
            &options,
        )
        .await
        .unwrap();

        assert_eq!(github.calls_of("update_pull_request"), 1);
    }

    #[tokio::test]
    async fn moved_base_is_refreshed_under_same_name() {
        let github = FakeGitHub::new();
        let base = "@base-for/refs/heads/@changes/main/alice/topic";
        let number = github.add_pr(BRANCH, base, PrState::Open);
        let existing = github.pr(number);
        let options = SyncOptions {
            refresh_base_via: Some("master".to_string()),
        };

        let outcome = reconcile(
            &github,
            &pushed(),
            existing,
            &published(base, true),
            String::new(),
            &options,
        )
        .await
        .unwrap();

        assert_eq!(outcome, SyncOutcome::Refreshed(number));
        assert_eq!(
            github.mutations(),
            vec![
                GitHubEffect::UpdatePullRequest {
                    pr: number,
                    base: Some("master".to_string()),
                    reopen: false,
                },
                GitHubEffect::UpdatePullRequest {
                    pr: number,
                    base: Some(base.to_string()),
                    reopen: false,
                },
            ]
        );
        assert_eq!(github.pr(number).unwrap().base_ref, base);
    }

    #[tokio::test]
    async fn moved_base_without_refresh_branch_is_left_alone() {
        let github = FakeGitHub::new();
        let base = "@base-for/refs/heads/@changes/main/alice/topic";
        let number = github.add_pr(BRANCH, base, PrState::Open);
        let existing = github.pr(number);

        let outcome = reconcile(
            &github,
            &pushed(),
            existing,
            &published(base, true),
            String::new(),
            &SyncOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome, SyncOutcome::Unchanged(number));
        assert!(github.calls().is_empty());
    }

    #[tokio::test]
    async fn unmoved_base_is_not_refreshed() {
        let github = FakeGitHub::new();
        let base = "@base-for/refs/heads/@changes/main/alice/topic";
        let number = github.add_pr(BRANCH, base, PrState::Open);
        let existing = github.pr(number);
        let options = SyncOptions {
            refresh_base_via: Some("master".to_string()),
        };

        let outcome = reconcile(
            &github,
            &pushed(),
            existing,
            &published(base, false),
            String::new(),
            &options,
        )
        .await
        .unwrap();

        assert_eq!(outcome, SyncOutcome::Unchanged(number));
        assert!(github.calls().is_empty());
    }

    #[tokio::test]
    async fn merged_pr_is_never_reopened() {
        let github = FakeGitHub::new();
        let number = github.add_pr(BRANCH, "main", PrState::Merged);
        let existing = github.pr(number);

        let err = reconcile(
            &github,
            &pushed(),
            existing,
            &published("main", false),
            String::new(),
            &SyncOptions::default(),
        )
        .await
        .unwrap_err();

        assert_eq!(err, SyncError::Merged { pr: number });
        assert!(github.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_reopen_stops_before_retarget() {
        let github = FakeGitHub::new();
        let number = github.add_pr(BRANCH, "main", PrState::Closed);
        let existing = github.pr(number);
        github.fail("update_pull_request");

        let err = reconcile(
            &github,
            &pushed(),
            existing,
            &published("main", false),
            String::new(),
            &SyncOptions::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SyncError::Reopen { pr, .. } if pr == number));
        assert_eq!(github.calls_of("update_pull_request"), 1);
    }
}
