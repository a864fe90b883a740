//! Logging subsystem
//!
//! Installs a `tracing` subscriber: an `EnvFilter` (`RUST_LOG` wins over the
//! configured level) and a `fmt` layer, optionally JSON formatted.

use crate::config::LoggingConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod error;
mod level;

pub use error::LoggingError;
pub use level::LogLevel;

/// Initialize logging with the default configuration
pub fn init_logging() -> Result<(), LoggingError> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Initialize logging from the `[logging]` configuration section
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<(), LoggingError> {
    let level: LogLevel = config.level.parse()?;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let fmt_layer = fmt::layer().with_target(config.with_target);

    let result = if config.json_format {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    };

    result.map_err(|e| LoggingError::InitializationFailed(e.to_string()))
}
