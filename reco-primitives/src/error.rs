//! Shared error definitions for memory primitives.

use thiserror::Error;

/// Result alias used throughout the memory workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing primitive types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The provided entity identifier was empty or whitespace.
    #[error("invalid entity id `{id}`: {reason}")]
    InvalidEntityId {
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: &'static str,
    },

    /// The provided item identifier was empty or whitespace.
    #[error("invalid item id `{id}`: {reason}")]
    InvalidItemId {
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: &'static str,
    },
}
