//! Change references: branches following the `@changes` stacking convention.
//!
//! A change is pushed to `refs/heads/@changes/<declared-base>/<author>/<topic>`.
//! The declared base is whatever the author wrote; the real base is worked out
//! from commit ancestry and materialized under `@base-for/`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::Sha;

/// Prefix every branch ref carries in push payloads and ref listings.
pub const HEADS_PREFIX: &str = "refs/heads/";

/// Full ref prefix of the stacking namespace.
pub const CHANGES_PREFIX: &str = "refs/heads/@changes/";

/// Namespace passed to GitHub's matching-refs endpoint (no `refs/`, no trailing slash).
///
/// The endpoint does a plain prefix match, so results must still be parsed.
pub const CHANGES_NAMESPACE: &str = "heads/@changes";

/// Branch prefix under which stable base refs are published.
pub const BASE_FOR_PREFIX: &str = "@base-for/";

/// Strips a leading `refs/heads/` if present.
pub fn branch_name(name: &str) -> &str {
    name.strip_prefix(HEADS_PREFIX).unwrap_or(name)
}

/// Returns true if two base names denote the same branch, ignoring `refs/heads/`.
pub fn same_branch(a: &str, b: &str) -> bool {
    branch_name(a) == branch_name(b)
}

/// The name of a change ref, split into its convention segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeRefName {
    /// The full ref string, e.g. `refs/heads/@changes/main/alice/feature-x`.
    pub full_name: String,
    /// The base the author declared; only used when no stacking parent is found.
    pub declared_base: String,
    pub author: String,
    /// Everything after the author segment; may itself contain `/`.
    pub topic: String,
}

impl ChangeRefName {
    /// Parses a full ref name against the stacking convention.
    ///
    /// Returns `None` unless the name is `refs/heads/@changes/` followed by a
    /// non-empty base, a non-empty author and a non-empty topic. Only the first
    /// two segments are split off; the topic keeps any further slashes.
    ///
    /// # Examples
    ///
    /// ```
    /// use stack_sync::types::ChangeRefName;
    ///
    /// let name = ChangeRefName::parse("refs/heads/@changes/main/alice/ui/button").unwrap();
    /// assert_eq!(name.declared_base, "main");
    /// assert_eq!(name.author, "alice");
    /// assert_eq!(name.topic, "ui/button");
    ///
    /// assert!(ChangeRefName::parse("refs/heads/main").is_none());
    /// assert!(ChangeRefName::parse("refs/heads/@changes/main/alice").is_none());
    /// ```
    pub fn parse(full_name: &str) -> Option<Self> {
        let rest = full_name.strip_prefix(CHANGES_PREFIX)?;
        let (declared_base, rest) = rest.split_once('/')?;
        let (author, topic) = rest.split_once('/')?;

        if declared_base.is_empty() || author.is_empty() || topic.is_empty() {
            return None;
        }

        Some(ChangeRefName {
            full_name: full_name.to_string(),
            declared_base: declared_base.to_string(),
            author: author.to_string(),
            topic: topic.to_string(),
        })
    }

    /// The branch name (full name without `refs/heads/`).
    pub fn branch(&self) -> &str {
        branch_name(&self.full_name)
    }

    /// The branch that holds this change's stable base: `@base-for/<full name>`.
    pub fn base_for_branch(&self) -> String {
        format!("{}{}", BASE_FOR_PREFIX, self.full_name)
    }

    /// The full ref of [`Self::base_for_branch`].
    pub fn base_for_ref(&self) -> String {
        format!("{}{}", HEADS_PREFIX, self.base_for_branch())
    }
}

impl fmt::Display for ChangeRefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

/// A tracked change: a convention-matching ref and the commit it points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeRef {
    pub name: ChangeRefName,
    pub head_commit: Sha,
}

impl ChangeRef {
    /// Parses `full_name` and pairs it with its head commit.
    pub fn parse(full_name: &str, head_commit: Sha) -> Option<Self> {
        ChangeRefName::parse(full_name).map(|name| ChangeRef { name, head_commit })
    }

    pub fn full_name(&self) -> &str {
        &self.name.full_name
    }
}
