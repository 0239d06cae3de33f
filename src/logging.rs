//! Tracing subscriber setup

use crate::config::LoggingConfig;
use crate::errors::{EvvmError, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. Fails if a subscriber is
/// already installed or the format is unknown.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format.as_str() {
        "json" => registry.with(fmt::layer().json()).try_init(),
        "pretty" => registry.with(fmt::layer()).try_init(),
        other => {
            return Err(EvvmError::ConfigError(format!(
                "unknown log format: {}",
                other
            )))
        }
    };

    installed.map_err(|e| EvvmError::ConfigError(format!("cannot install logger: {}", e)))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| EvvmError::ConfigError(format!("invalid log level {}: {}", config.level, e))),
    }
}
