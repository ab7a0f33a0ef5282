//! Core shared types for the user memory subsystem.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod ids;

/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Opaque identifiers for remembered entities and catalog items.
pub use ids::{EntityId, ItemId};
