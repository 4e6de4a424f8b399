//! Pull request state as observed on GitHub.

use serde::{Deserialize, Serialize};

/// The state of a pull request.
///
/// GitHub reports merged PRs as `closed`; they are distinguished here because a
/// merged PR cannot be reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrState {
    /// The PR is open.
    Open,

    /// The PR was closed without merging. It can be reopened.
    Closed,

    /// The PR was merged.
    Merged,
}

impl PrState {
    /// Returns true if the PR is open.
    pub fn is_open(&self) -> bool {
        matches!(self, PrState::Open)
    }

    /// Returns true if the PR was merged.
    pub fn is_merged(&self) -> bool {
        matches!(self, PrState::Merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_predicates() {
        assert!(PrState::Open.is_open());
        assert!(!PrState::Closed.is_open());
        assert!(!PrState::Merged.is_open());
        assert!(PrState::Merged.is_merged());
        assert!(!PrState::Closed.is_merged());
    }

    #[test]
    fn state_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&PrState::Merged).unwrap(), "\"merged\"");
    }
}
