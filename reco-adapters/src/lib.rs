//! Model adapters that provide the external capabilities consumed by memory stores.
//!
//! The memory subsystem only depends on the [`traits::TextGenerator`] and
//! [`traits::TextEmbedder`] seams. [`ollama`] talks to a local Ollama daemon and
//! [`sim`] offers deterministic embeddings for tests and offline runs.

#![warn(missing_docs, clippy::pedantic)]

pub mod ollama;
pub mod sim;
pub mod traits;

mod http_client;
