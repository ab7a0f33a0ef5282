//! User memory for LLM-driven recommenders.
//!
//! Bundles the memory crates behind feature flags so downstream users can pick
//! the components they need. With the `ollama` feature, [`setup`] builds a
//! ready-to-use [`memory::UserMemory`] from a settings file.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared identifiers for convenience.
pub use reco_primitives as primitives;

/// Generation and embedding adapters (enabled by `adapters` feature).
#[cfg(feature = "adapters")]
pub use reco_adapters as adapters;

/// Settings schema and loader (enabled by `config` feature).
#[cfg(feature = "config")]
pub use reco_config as config;

/// Tracing subscriber setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use reco_telemetry as telemetry;

/// Short-term, long-term, and coordinated memory (enabled by `memory` feature).
#[cfg(feature = "memory")]
pub use reco_memory as memory;

#[cfg(feature = "ollama")]
pub mod setup;
