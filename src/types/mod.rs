//! Core domain types for the stack sync bot.
//!
//! This module contains the fundamental types used throughout the application,
//! designed to encode invariants via the type system.

pub mod change;
pub mod ids;
pub mod pr;

pub use change::{ChangeRef, ChangeRefName};
pub use ids::{DeliveryId, InvalidSha, PrNumber, RepoId, Sha};
pub use pr::PrState;
