//! Logging bootstrap.

use crate::config::LoggingConfig;
use crate::error::{CoreError, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter. Calling this more
/// than once is harmless: later calls return `Ok(false)` and leave the first
/// subscriber in place.
pub fn init_logging(config: &LoggingConfig) -> Result<bool> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| CoreError::Logging(format!("invalid filter '{}': {e}", config.filter)))?;

    let installed = if config.json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true))
            .with(filter)
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter)
            .try_init()
            .is_ok()
    };

    if installed {
        tracing::info!("trawl v{} logging initialized", env!("CARGO_PKG_VERSION"));
    }
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        let config = LoggingConfig::default();
        assert!(init_logging(&config).is_ok());
        assert!(!init_logging(&config).expect("second init succeeds"));
    }
}
