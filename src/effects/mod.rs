//! Effects-as-data for GitHub operations.
//!
//! This module defines effect types that describe operations without executing them.
//! This enables:
//! - Pipeline stages that are plain functions of their inputs and responses
//! - Testability via fake interpreters that record every call
//! - Logging/tracing of intended operations

pub mod github;
pub mod interpreter;

pub use github::{CommitData, GitHubEffect, GitHubResponse, PrData, RefData};
pub use interpreter::GitHubInterpreter;
