//! Structured logging setup for the transit CMAC service
//!
//! Logs always go to stderr; stdout is reserved for responses.

use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

/// Log output style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// Human-readable lines (development)
    Console,
    /// JSON lines (production)
    Json,
}

/// Build the level filter: `RUST_LOG` wins, otherwise `default_level`.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize structured logging
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(
    service_name: &str,
    default_level: &str,
    output: Output,
) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(env_filter(default_level));

    match output {
        Output::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .try_init()?,
        Output::Console => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()?,
    }

    tracing::info!(
        service = service_name,
        output = ?output,
        "Logging initialized"
    );
    Ok(())
}
