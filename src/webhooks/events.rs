//! Typed webhook events.
//!
//! Only `push` deliveries drive the sync pipeline. Every other event type is
//! acknowledged and dropped by the parser.

use serde::{Deserialize, Serialize};

use crate::types::{RepoId, Sha};

/// A branch push, reduced to the fields the sync pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    /// The repository the push landed in.
    pub repo: RepoId,

    /// The full pushed ref, e.g. `refs/heads/@changes/main/alice/topic`.
    pub ref_name: String,

    /// The ref's head after the push (all zeros for a deletion).
    pub after: Sha,

    /// True when the push deleted the ref.
    pub deleted: bool,

    /// Message of the head commit, when the payload carries one.
    pub head_commit_message: Option<String>,
}

impl PushEvent {
    /// Title for a pull request opened from this push.
    ///
    /// The first line of the head commit message, or empty when the payload
    /// has no head commit.
    pub fn title(&self) -> String {
        self.head_commit_message
            .as_deref()
            .and_then(|message| message.lines().next())
            .unwrap_or_default()
            .trim_end()
            .to_string()
    }
}
