//! Observability utilities for the user memory subsystem.

#![warn(missing_docs, clippy::pedantic)]

pub mod tracing_support;

pub use tracing_support::{TelemetryError, init_tracing};
