//! Webhook endpoint handler.
//!
//! Verifies the delivery's signature, parses `push` events and hands each one
//! to a background task before returning 202 Accepted. The push is handled
//! after the response is sent; its outcome only shows up in the logs.

use std::fmt;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::{AppState, ClientFactory};
use crate::effects::GitHubInterpreter;
use crate::sync::{PushOutcome, SyncOptions, handle_push};
use crate::types::DeliveryId;
use crate::webhooks::{ParseError, PushEvent, parse_webhook, verify_signature};

/// Header name for GitHub event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID.
const HEADER_DELIVERY: &str = "x-github-delivery";
/// Header name for GitHub signature.
const HEADER_SIGNATURE: &str = "x-hub-signature-256";

/// Errors that can occur when accepting a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] ParseError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeader(_) | WebhookError::InvalidPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,
        };

        (status, self.to_string()).into_response()
    }
}

/// Webhook handler.
///
/// # Response
///
/// - 202 Accepted: push queued, or event type ignored
/// - 400 Bad Request: missing header or malformed push payload
/// - 401 Unauthorized: invalid signature
pub async fn webhook_handler<F: ClientFactory>(
    State(app_state): State<AppState<F>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let event_type = get_header(&headers, HEADER_EVENT)?;
    let delivery_id = DeliveryId::new(get_header(&headers, HEADER_DELIVERY)?);
    let signature_header = get_header(&headers, HEADER_SIGNATURE)?;

    debug!(delivery_id = %delivery_id, event_type = %event_type, "Received webhook");

    // Nothing in the body is looked at before this check.
    if !verify_signature(&body, &signature_header, app_state.webhook_secret()) {
        warn!(delivery_id = %delivery_id, "Invalid webhook signature");
        return Err(WebhookError::InvalidSignature);
    }

    let Some(event) = parse_webhook(&event_type, &body)? else {
        debug!(delivery_id = %delivery_id, event_type = %event_type, "Ignoring event type");
        return Ok((StatusCode::ACCEPTED, "Ignored"));
    };

    let github = app_state.factory().client_for(&event.repo);
    let options = app_state.options().clone();
    let span = info_span!("push", delivery_id = %delivery_id);
    app_state
        .tracker()
        .spawn(process_push(github, event, options).instrument(span));

    Ok((StatusCode::ACCEPTED, "Accepted"))
}

/// Runs the sync pipeline for one push and logs how it ended.
async fn process_push<G>(github: G, event: PushEvent, options: SyncOptions)
where
    G: GitHubInterpreter + Sync,
    G::Error: fmt::Display,
{
    match handle_push(&github, &event, &options).await {
        Ok(PushOutcome::Ignored(reason)) => debug!(?reason, "Push ignored"),
        Ok(PushOutcome::AmbiguousPullRequest { numbers }) => {
            warn!(prs = ?numbers, "Push left ambiguous pull requests untouched");
        }
        Ok(PushOutcome::Synced { base, pr }) => info!(base = %base, outcome = ?pr, "Push synced"),
        Err(e) => error!(error = %e, "Push sync failed"),
    }
}

/// Extracts a required header value as a string.
fn get_header(headers: &HeaderMap, name: &'static str) -> Result<String, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or(WebhookError::MissingHeader(name))
}
