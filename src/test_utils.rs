//! Shared test utilities: an in-memory GitHub and log capture.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing_subscriber::fmt::MakeWriter;

use crate::effects::{CommitData, GitHubEffect, GitHubInterpreter, GitHubResponse, PrData, RefData};
use crate::server::ClientFactory;
use crate::types::change::branch_name;
use crate::types::{PrNumber, PrState, RepoId, Sha};
use crate::webhooks::PushEvent;

/// A deterministic SHA built from a small number.
pub fn sha(n: u8) -> Sha {
    Sha::parse(format!("{:040x}", n)).unwrap()
}

/// A push of `after` to `ref_name` in `octocat/hello-world`.
pub fn push_event(ref_name: &str, after: Sha, message: Option<&str>) -> PushEvent {
    PushEvent {
        repo: RepoId::new("octocat", "hello-world"),
        ref_name: ref_name.to_string(),
        after,
        deleted: false,
        head_commit_message: message.map(str::to_string),
    }
}

/// Name of an effect variant, matching its serde tag.
pub fn effect_kind(effect: &GitHubEffect) -> &'static str {
    match effect {
        GitHubEffect::ListMatchingRefs { .. } => "list_matching_refs",
        GitHubEffect::GetCommit { .. } => "get_commit",
        GitHubEffect::CreateRef { .. } => "create_ref",
        GitHubEffect::UpdateRef { .. } => "update_ref",
        GitHubEffect::ListPullRequests { .. } => "list_pull_requests",
        GitHubEffect::CreatePullRequest { .. } => "create_pull_request",
        GitHubEffect::UpdatePullRequest { .. } => "update_pull_request",
    }
}

#[derive(Default)]
struct FakeState {
    refs: BTreeMap<String, Sha>,
    commits: HashMap<Sha, CommitData>,
    prs: Vec<PrData>,
    calls: Vec<GitHubEffect>,
    failing: HashSet<&'static str>,
}

/// An in-memory repository that answers effects the way GitHub does and
/// records every effect it receives.
///
/// Refs are full names (`refs/heads/...`); PR heads and bases are stored as
/// branch names, as GitHub reports them.
#[derive(Default)]
pub struct FakeGitHub {
    state: Mutex<FakeState>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Creates or moves a ref.
    pub fn add_ref(&self, name: &str, sha: Sha) {
        self.lock().refs.insert(name.to_string(), sha);
    }

    pub fn add_commit(&self, sha: Sha, parents: Vec<Sha>, message: &str) {
        self.lock().commits.insert(
            sha.clone(),
            CommitData {
                sha,
                parents,
                message: message.to_string(),
            },
        );
    }

    /// Adds a PR and returns its number.
    pub fn add_pr(&self, head: &str, base: &str, state: PrState) -> PrNumber {
        let mut st = self.lock();
        let number = PrNumber(st.prs.len() as u64 + 1);
        st.prs.push(PrData {
            number,
            head_ref: branch_name(head).to_string(),
            base_ref: branch_name(base).to_string(),
            state,
            title: String::new(),
        });
        number
    }

    /// Makes every later effect of this kind fail.
    pub fn fail(&self, kind: &'static str) {
        self.lock().failing.insert(kind);
    }

    pub fn ref_sha(&self, name: &str) -> Option<Sha> {
        self.lock().refs.get(name).cloned()
    }

    pub fn pr(&self, number: PrNumber) -> Option<PrData> {
        self.lock().prs.iter().find(|pr| pr.number == number).cloned()
    }

    /// Every effect received, in order.
    pub fn calls(&self) -> Vec<GitHubEffect> {
        self.lock().calls.clone()
    }

    /// Every non-read effect received, in order.
    pub fn mutations(&self) -> Vec<GitHubEffect> {
        self.calls()
            .into_iter()
            .filter(|effect| !effect.is_read_only())
            .collect()
    }

    pub fn calls_of(&self, kind: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|effect| effect_kind(effect) == kind)
            .count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn apply(&self, effect: GitHubEffect) -> Result<GitHubResponse, String> {
        let mut st = self.lock();
        st.calls.push(effect.clone());

        let kind = effect_kind(&effect);
        if st.failing.contains(kind) {
            return Err(format!("injected {} failure", kind));
        }

        match effect {
            GitHubEffect::ListMatchingRefs { prefix } => {
                let prefix = format!("refs/{}", prefix);
                Ok(GitHubResponse::Refs(
                    st.refs
                        .iter()
                        .filter(|(name, _)| name.starts_with(&prefix))
                        .map(|(name, sha)| RefData {
                            name: name.clone(),
                            sha: sha.clone(),
                        })
                        .collect(),
                ))
            }
            GitHubEffect::GetCommit { sha } => Ok(match st.commits.get(&sha) {
                Some(commit) => GitHubResponse::Commit(commit.clone()),
                None => GitHubResponse::CommitNotFound,
            }),
            GitHubEffect::CreateRef { name, sha } => {
                if st.refs.contains_key(&name) {
                    Ok(GitHubResponse::RefAlreadyExists)
                } else {
                    st.refs.insert(name, sha);
                    Ok(GitHubResponse::RefCreated)
                }
            }
            GitHubEffect::UpdateRef { name, sha, .. } => match st.refs.get_mut(&name) {
                Some(target) => {
                    *target = sha;
                    Ok(GitHubResponse::RefUpdated)
                }
                None => Err("Reference does not exist".to_string()),
            },
            GitHubEffect::ListPullRequests { head } => {
                let head = branch_name(&head);
                Ok(GitHubResponse::PrList(
                    st.prs
                        .iter()
                        .filter(|pr| pr.head_ref == head)
                        .cloned()
                        .collect(),
                ))
            }
            GitHubEffect::CreatePullRequest { head, base, title } => {
                let pr = PrData {
                    number: PrNumber(st.prs.len() as u64 + 1),
                    head_ref: branch_name(&head).to_string(),
                    base_ref: branch_name(&base).to_string(),
                    state: PrState::Open,
                    title,
                };
                st.prs.push(pr.clone());
                Ok(GitHubResponse::PrCreated(pr))
            }
            GitHubEffect::UpdatePullRequest { pr, base, reopen } => {
                let found = st
                    .prs
                    .iter_mut()
                    .find(|candidate| candidate.number == pr)
                    .ok_or_else(|| format!("no pull request {}", pr))?;
                if let Some(base) = base {
                    found.base_ref = branch_name(&base).to_string();
                }
                if reopen {
                    if found.state.is_merged() {
                        return Err(format!("{} is merged and cannot be reopened", pr));
                    }
                    found.state = PrState::Open;
                }
                Ok(GitHubResponse::PrUpdated(found.clone()))
            }
        }
    }
}

impl GitHubInterpreter for FakeGitHub {
    type Error = String;

    async fn interpret(&self, effect: GitHubEffect) -> Result<GitHubResponse, Self::Error> {
        self.apply(effect)
    }
}

/// Hands the same fake to every repository.
impl ClientFactory for Arc<FakeGitHub> {
    type Client = Arc<FakeGitHub>;

    fn client_for(&self, _repo: &RepoId) -> Self::Client {
        Arc::clone(self)
    }
}

/// A log sink for asserting on emitted diagnostics.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// A plain-text fmt subscriber writing into this buffer.
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
