use strum_macros::{Display, EnumString};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry};

const SERVICE_NAME: &str = "hashinator";

/// Output format of the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum LogFormat {
    /// Human readable, one line per event
    Compact,
    /// Bunyan formatted JSON, one object per line
    Json,
}

/// Installs the global tracing subscriber. Logs go to stderr so that stdout stays reserved for command output.
///
/// The filter is read from `RUST_LOG` and defaults to `info`.
///
/// # Panics
/// Panics if a global subscriber was already installed
pub fn initialize_subscriber(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default().with(env_filter);

    match format {
        LogFormat::Compact => subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Json => subscriber
            .with(JsonStorageLayer)
            .with(BunyanFormattingLayer::new(
                SERVICE_NAME.to_string(),
                std::io::stderr,
            ))
            .init(),
    }
}
