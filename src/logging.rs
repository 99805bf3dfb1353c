//! Subscriber setup for the binary and for embedders that want the defaults
//!
//! Security events (every protection change, restoration and refused
//! override) go to their own target so they can be filtered independently.

use crate::config::{ConfigError, LoggingConfig};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::filter::{Directive, EnvFilter};
use tracing_subscriber::{fmt, prelude::*};

/// Target carrying security-relevant events
pub const SECURITY_TARGET: &str = "memscan::security";

/// Builds the filter from the configured level, letting `RUST_LOG` override it
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, ConfigError> {
    let level = config
        .filter_level()
        .ok_or_else(|| ConfigError::Invalid(format!("Invalid log level: {}", config.level)))?;
    let mut filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| ConfigError::Invalid(format!("log filter: {}", e)))?;

    if !config.log_security_events {
        let directive: Directive = format!("{}=off", SECURITY_TARGET)
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("log directive: {}", e)))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

/// Installs the global subscriber.
///
/// Logs go to stderr, or are appended to `config.file` when it is set.
pub fn init(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.file.is_empty() {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.file)?;
        registry
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .try_init()
    };

    installed.map_err(|e| ConfigError::Invalid(format!("logging already initialised: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_filter_from_level() {
        let mut logging = Config::default().logging;
        logging.level = "debug".to_string();
        assert!(build_filter(&logging).is_ok());
    }

    #[test]
    fn test_filter_from_alias_level() {
        let mut logging = Config::default().logging;
        logging.level = "critical".to_string();
        assert!(build_filter(&logging).is_ok());
        logging.level = "loud".to_string();
        assert!(build_filter(&logging).is_err());
    }

    #[test]
    fn test_security_directive() {
        let mut logging = Config::default().logging;
        logging.log_security_events = false;
        let filter = build_filter(&logging).unwrap();
        assert!(filter.to_string().contains("memscan::security=off"));
    }
}
