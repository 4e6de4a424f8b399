//! HTTP server for the stack sync bot.
//!
//! This module implements the HTTP server that:
//! - Accepts push webhooks from GitHub, validates signatures, and hands each
//!   push to a tracked background task
//! - Provides health checks for liveness probes
//!
//! # Endpoints
//!
//! - `POST /webhook` - Accepts GitHub webhook deliveries (returns 202 Accepted)
//! - `GET /health` - Returns 200 if server is running

use std::fmt;
use std::sync::Arc;

use octocrab::Octocrab;
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;

use crate::effects::GitHubInterpreter;
use crate::github::OctocrabClient;
use crate::sync::SyncOptions;
use crate::types::RepoId;

pub mod health;
pub mod webhook;

pub use health::health_handler;
pub use webhook::{WebhookError, webhook_handler};

/// Builds a repo-scoped GitHub client for each push.
pub trait ClientFactory: Send + Sync + 'static {
    type Client: GitHubInterpreter<Error: fmt::Display + Send> + Send + Sync + 'static;

    fn client_for(&self, repo: &RepoId) -> Self::Client;
}

/// Production factory sharing one authenticated octocrab instance.
#[derive(Debug, Clone)]
pub struct OctocrabFactory {
    client: Octocrab,
    head_owner: Option<String>,
}

impl OctocrabFactory {
    pub fn new(client: Octocrab, head_owner: Option<String>) -> Self {
        OctocrabFactory { client, head_owner }
    }
}

impl ClientFactory for OctocrabFactory {
    type Client = OctocrabClient;

    fn client_for(&self, repo: &RepoId) -> OctocrabClient {
        let client = OctocrabClient::new(self.client.clone(), repo.clone());
        match &self.head_owner {
            Some(owner) => client.with_head_owner(owner.clone()),
            None => client,
        }
    }
}

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
pub struct AppState<F> {
    inner: Arc<AppStateInner<F>>,
}

struct AppStateInner<F> {
    /// Webhook secret for HMAC-SHA256 signature verification.
    webhook_secret: Vec<u8>,

    factory: F,

    options: SyncOptions,

    /// Tracks in-flight push handlers so shutdown can wait for them.
    tracker: TaskTracker,
}

impl<F> Clone for AppState<F> {
    fn clone(&self) -> Self {
        AppState {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: ClientFactory> AppState<F> {
    pub fn new(webhook_secret: impl Into<Vec<u8>>, factory: F, options: SyncOptions) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                webhook_secret: webhook_secret.into(),
                factory,
                options,
                tracker: TaskTracker::new(),
            }),
        }
    }

    pub fn webhook_secret(&self) -> &[u8] {
        &self.inner.webhook_secret
    }

    pub fn factory(&self) -> &F {
        &self.inner.factory
    }

    pub fn options(&self) -> &SyncOptions {
        &self.inner.options
    }

    /// The tracker push handlers are spawned on.
    pub fn tracker(&self) -> &TaskTracker {
        &self.inner.tracker
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router<F: ClientFactory>(app_state: AppState<F>) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/webhook", post(webhook_handler::<F>))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
