//! Stack Sync - A GitHub bot that keeps pull requests of stacked `@changes`
//! branches targeting the change they are stacked on.
//!
//! This library provides the domain types, the GitHub effect layer, the sync
//! pipeline and the webhook server.

pub mod config;
pub mod effects;
pub mod github;
pub mod server;
pub mod sync;
pub mod types;
pub mod webhooks;

#[cfg(test)]
mod test_utils;
