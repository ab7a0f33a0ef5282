//! Configuration management for the user memory subsystem.
//!
//! [`schema`] describes the settings file, [`loader`] reads and validates it.

#![warn(missing_docs, clippy::pedantic)]

mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_settings, parse_settings};
pub use schema::{LogFormat, LoggingSettings, MemorySettings, OllamaSettings, Settings};
