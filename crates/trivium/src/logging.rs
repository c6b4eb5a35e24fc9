//! Logging setup for the server binary.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::TriviumError;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `level` when set. With `json`, every event is
/// written as one JSON object per line.
pub fn setup_logging(level: &str, json: bool) -> Result<(), TriviumError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| TriviumError::Logging(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()
    };
    result.map_err(|e| TriviumError::Logging(e.to_string()))?;

    tracing::info!(level, json, "logging initialized");
    Ok(())
}
