//! GitHub webhook payload parser.
//!
//! Parses raw webhook JSON into a [`PushEvent`]. The event type comes from the
//! `X-GitHub-Event` header:
//!
//! - `push` payloads are parsed and validated
//! - every other event type returns `Ok(None)` (ignored, not an error)
//! - malformed `push` payloads return `Err` with details

use serde::Deserialize;
use thiserror::Error;

use crate::types::{RepoId, Sha};

use super::events::PushEvent;

/// Error type for webhook parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON deserialization failed (includes missing required fields).
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Field has invalid value (e.g., malformed SHA).
    #[error("invalid field value for {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Parses a webhook payload.
///
/// # Returns
///
/// * `Ok(Some(event))` - a `push` delivery
/// * `Ok(None)` - any other event type
/// * `Err(e)` - a `push` delivery with a malformed payload
///
/// # Examples
///
/// ```
/// use stack_sync::webhooks::parse_webhook;
///
/// let payload = br#"{
///     "ref": "refs/heads/@changes/main/alice/topic",
///     "before": "0000000000000000000000000000000000000000",
///     "after": "aa218f56b14c9653891f9e74264a383fa43fefbd",
///     "repository": { "name": "hello-world", "owner": { "login": "octocat" } }
/// }"#;
///
/// let event = parse_webhook("push", payload).unwrap().unwrap();
/// assert_eq!(event.ref_name, "refs/heads/@changes/main/alice/topic");
///
/// assert!(parse_webhook("issue_comment", b"{}").unwrap().is_none());
/// ```
pub fn parse_webhook(event_type: &str, payload: &[u8]) -> Result<Option<PushEvent>, ParseError> {
    match event_type {
        "push" => parse_push(payload).map(Some),
        _ => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
struct RawPushPayload {
    #[serde(rename = "ref")]
    ref_name: String,
    after: String,
    #[serde(default)]
    deleted: bool,
    head_commit: Option<RawHeadCommit>,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawHeadCommit {
    message: Option<String>,
}

/// Push payloads carry the owner both as `login` and, for user-owned repos,
/// as `name`. Either is accepted.
#[derive(Debug, Deserialize)]
struct RawRepository {
    owner: RawOwner,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    login: Option<String>,
    name: Option<String>,
}

fn parse_sha(field: &'static str, value: String) -> Result<Sha, ParseError> {
    Sha::parse(&value).map_err(|_| ParseError::InvalidField { field, value })
}

fn parse_push(payload: &[u8]) -> Result<PushEvent, ParseError> {
    let raw: RawPushPayload = serde_json::from_slice(payload)?;

    let owner = raw
        .repository
        .owner
        .login
        .or(raw.repository.owner.name)
        .filter(|owner| !owner.is_empty())
        .ok_or_else(|| ParseError::InvalidField {
            field: "repository.owner",
            value: String::new(),
        })?;

    Ok(PushEvent {
        repo: RepoId::new(owner, raw.repository.name),
        ref_name: raw.ref_name,
        after: parse_sha("after", raw.after)?,
        deleted: raw.deleted,
        head_commit_message: raw.head_commit.and_then(|c| c.message),
    })
}
