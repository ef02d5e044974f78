//! Tracing subscriber setup for binaries.
//!
//! The library only emits events; installing a subscriber is left to the
//! executable.

use thiserror::Error;
use tracing_subscriber::{EnvFilter, prelude::*};

/// Default filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_DIRECTIVE: &str = "warn,taskboard=info";

/// Errors raised while installing the tracing subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter directive could not be parsed.
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    /// A global subscriber is already installed.
    #[error("tracing subscriber already installed: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// Installs a formatted subscriber writing to standard error.
///
/// The filter comes from `RUST_LOG` when set, otherwise from
/// `default_directive`.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the directive is invalid or a subscriber
/// is already installed.
pub fn init_tracing(default_directive: &str) -> Result<(), TelemetryError> {
    let directive = std::env::var("RUST_LOG").unwrap_or_else(|_| default_directive.to_owned());
    let env_filter = EnvFilter::try_new(directive)?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(env_filter),
        )
        .try_init()?;
    Ok(())
}
