//! Per-user memory for LLM-driven recommenders.
//!
//! A [`UserMemory`] keeps a bounded window of recent interactions per entity
//! in a [`ShortTermStore`]. Every `consolidate_every`-th update the window is
//! summarised through a [`reco_adapters::traits::TextGenerator`] and the
//! summary is embedded into the entity's [`LongTermStore`], where it can later
//! be recalled by similarity. Both stores persist as a pair of JSON snapshots.

#![warn(missing_docs, clippy::pedantic)]

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod embeddings;
pub mod error;
pub mod ingest;
pub mod long_term;
pub mod persistence;
pub mod record;
pub mod reflection;
pub mod short_term;
pub mod vector_index;

pub use catalog::{ItemCatalog, ItemMemory};
pub use config::{RatingScale, UserMemoryConfig};
pub use coordinator::{
    EntityAttributes, MemoryScope, NoAttributes, Recollection, UpdateOutcome, UserMemory,
    UserMemoryBuilder,
};
pub use error::{MemoryError, MemoryResult};
pub use ingest::{HistoryEntry, IngestReport};
pub use long_term::LongTermStore;
pub use persistence::{LONG_TERM_FILE, LongTermSnapshot, SHORT_TERM_FILE, ShortTermSnapshot};
pub use record::InteractionRecord;
pub use reflection::ReflectionTemplate;
pub use short_term::ShortTermStore;
pub use vector_index::{LocalIndexFactory, LocalVectorIndex, VectorIndex, VectorIndexFactory};
