//! Structured tracing setup.

use reco_config::{LogFormat, LoggingSettings};
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured filter directive could not be parsed.
    #[error("invalid log filter `{filter}`: {reason}")]
    InvalidFilter {
        /// Directive taken from the settings.
        filter: String,
        /// Parser message.
        reason: String,
    },
    /// A global subscriber was already installed.
    #[error("tracing subscriber already initialised: {reason}")]
    AlreadyInitialised {
        /// Message from `tracing_subscriber`.
        reason: String,
    },
}

/// Builds the filter, preferring `RUST_LOG` over the configured directive.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] if `RUST_LOG` is unset and the
/// configured directive does not parse.
pub fn build_filter(settings: &LoggingSettings) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&settings.filter).map_err(|err| TelemetryError::InvalidFilter {
        filter: settings.filter.clone(),
        reason: err.to_string(),
    })
}

/// Installs the global `tracing` subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or a subscriber is
/// already installed.
pub fn init_tracing(settings: &LoggingSettings) -> Result<(), TelemetryError> {
    let filter = build_filter(settings)?;
    let span_events = if settings.span_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = match settings.format {
        LogFormat::Full => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_span_events(span_events),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_span_events(span_events),
            )
            .try_init(),
    };

    result.map_err(|err| TelemetryError::AlreadyInitialised {
        reason: err.to_string(),
    })
}
