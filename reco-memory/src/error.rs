//! Error types for the memory subsystem.

use std::path::PathBuf;

use reco_adapters::traits::AdapterError;
use reco_primitives::EntityId;
use serde_json::Error as SerdeError;
use thiserror::Error;

/// Errors emitted by memory components.
///
/// Unknown entities are never an error: read paths on entities without state
/// return empty results.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// The provided configuration was invalid.
    #[error("invalid memory configuration: {0}")]
    InvalidConfig(&'static str),
    /// Underlying I/O failure while reading or writing snapshots.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
    /// Serialization or deserialization error.
    #[error("serialization error: {source}")]
    Serialization {
        /// Source [`serde_json::Error`].
        #[from]
        source: SerdeError,
    },
    /// The builder was finalised without a generation adapter.
    #[error("text generator not configured")]
    MissingGenerator,
    /// The builder was finalised without an embedding adapter.
    #[error("text embedder not configured")]
    MissingEmbedder,
    /// The generation capability failed while reflecting.
    #[error("generation failed: {source}")]
    Generation {
        /// Adapter failure.
        #[source]
        source: AdapterError,
    },
    /// The embedding capability failed or returned an unusable vector.
    #[error("embedding failed: {source}")]
    Embedding {
        /// Adapter failure.
        #[source]
        source: AdapterError,
    },
    /// The embedder returned a vector of the wrong length.
    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        /// Dimensionality the long-term store was built for.
        expected: usize,
        /// Dimensionality actually returned.
        actual: usize,
    },
    /// The long-term log entry and its vector could not be committed together;
    /// neither was kept.
    #[error("long-term write for `{entity}` rolled back: {reason}")]
    AtomicWrite {
        /// Entity whose write was rolled back.
        entity: EntityId,
        /// Why the index rejected the insert.
        reason: String,
    },
    /// Automatic consolidation failed after the short-term update was applied.
    #[error("consolidation for `{entity}` at update {update_count} failed: {source}")]
    Consolidation {
        /// Entity being consolidated.
        entity: EntityId,
        /// Update count that triggered consolidation.
        update_count: u64,
        /// Underlying generation, embedding, or atomic-write failure.
        #[source]
        source: Box<MemoryError>,
    },
    /// A persisted snapshot component is absent.
    #[error("persisted memory state missing: {}", path.display())]
    MissingState {
        /// Expected location of the component.
        path: PathBuf,
    },
    /// Reading or writing one snapshot file failed.
    #[error("snapshot file {} failed: {source}", path.display())]
    Persist {
        /// Directory or file whose read or write failed.
        path: PathBuf,
        /// Underlying I/O or serialization failure.
        #[source]
        source: Box<MemoryError>,
    },
    /// A persisted snapshot violates store invariants.
    #[error("invalid memory snapshot: {reason}")]
    InvalidSnapshot {
        /// Description of the violation.
        reason: String,
    },
    /// Vector index backend reported an application error.
    #[error("vector index error: {reason}")]
    VectorIndex {
        /// Human-readable reason describing the failure.
        reason: String,
    },
    /// A retrieval scope string did not name a known scope.
    #[error("unknown memory scope `{0}` (expected short, long, or all)")]
    InvalidScope(String),
    /// A reflection template could not be used.
    #[error("invalid reflection template: {0}")]
    InvalidTemplate(&'static str),
}

impl MemoryError {
    /// Helper to construct vector index errors from string-like values.
    #[must_use]
    pub fn vector_index(reason: impl Into<String>) -> Self {
        Self::VectorIndex {
            reason: reason.into(),
        }
    }

    /// Attaches the snapshot file path to an I/O or serialization failure.
    #[must_use]
    pub fn persist(path: impl Into<PathBuf>, source: impl Into<MemoryError>) -> Self {
        Self::Persist {
            path: path.into(),
            source: Box::new(source.into()),
        }
    }

    /// Helper to construct snapshot validation errors.
    #[must_use]
    pub fn invalid_snapshot(reason: impl Into<String>) -> Self {
        Self::InvalidSnapshot {
            reason: reason.into(),
        }
    }
}

/// Result type alias for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
