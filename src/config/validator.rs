//! Configuration validator for memscan
//!
//! Validates configuration values to ensure they are within acceptable ranges.

use super::loader::{Config, ConfigError, LoggingConfig, MemoryConfig, NarrowingConfig, ScannerConfig};

const VALID_LEVELS: [&str; 8] = [
    "trace", "debug", "info", "warn", "warning", "error", "critical", "off",
];

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the entire configuration
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        Self::validate_scanner(&config.scanner)?;
        Self::validate_narrowing(&config.narrowing)?;
        Self::validate_memory(&config.memory)?;
        Self::validate_logging(&config.logging)?;
        Ok(())
    }

    fn validate_scanner(scanner: &ScannerConfig) -> Result<(), ConfigError> {
        if scanner.min_threads == 0 || scanner.min_threads > 64 {
            return Err(ConfigError::Invalid(
                "Scanner min_threads must be between 1 and 64".to_string(),
            ));
        }

        if scanner.max_threads < scanner.min_threads {
            return Err(ConfigError::Invalid(
                "Scanner max_threads cannot be below min_threads".to_string(),
            ));
        }

        if scanner.max_threads > 128 {
            return Err(ConfigError::Invalid(
                "Scanner threads cannot exceed 128".to_string(),
            ));
        }

        if scanner.buffer_size_mb == 0 || scanner.buffer_size_mb > 1024 {
            return Err(ConfigError::Invalid(
                "Scanner buffer size must be between 1 and 1024 MB".to_string(),
            ));
        }

        validate_batch("scanner", scanner.batch_size)
    }

    fn validate_narrowing(narrowing: &NarrowingConfig) -> Result<(), ConfigError> {
        validate_batch("narrowing", narrowing.batch_size)?;

        if narrowing.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "Narrowing timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_memory(memory: &MemoryConfig) -> Result<(), ConfigError> {
        if memory.max_retry_attempts == 0 || memory.max_retry_attempts > 10 {
            return Err(ConfigError::Invalid(
                "Read retry attempts must be between 1 and 10".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
        if logging.filter_level().is_none() {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                logging.level, VALID_LEVELS
            )));
        }

        Ok(())
    }
}

fn validate_batch(section: &str, batch_size: usize) -> Result<(), ConfigError> {
    if !(100..=10_000).contains(&batch_size) {
        return Err(ConfigError::Invalid(format!(
            "{} batch size must be between 100 and 10000, got {}",
            section, batch_size
        )));
    }
    Ok(())
}

/// Validates a configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    ConfigValidator::validate(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_thread_bounds() {
        let mut config = Config::default();
        config.scanner.min_threads = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.scanner.min_threads = 8;
        config.scanner.max_threads = 4;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("max_threads"));

        let mut config = Config::default();
        config.scanner.max_threads = 129;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_buffer_size() {
        let mut config = Config::default();
        config.scanner.buffer_size_mb = 0;
        assert!(validate_config(&config).is_err());

        config.scanner.buffer_size_mb = 2048;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_batch_sizes() {
        let mut config = Config::default();
        config.narrowing.batch_size = 99;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("narrowing"));

        let mut config = Config::default();
        config.scanner.batch_size = 10_001;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = Config::default();
        config.narrowing.timeout_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_retry_attempts() {
        let mut config = Config::default();
        config.memory.max_retry_attempts = 0;
        assert!(validate_config(&config).is_err());
        config.memory.max_retry_attempts = 11;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("log level"));
    }

    #[test]
    fn test_edge_cases() {
        let mut config = Config::default();

        config.scanner.min_threads = 1;
        config.scanner.max_threads = 1;
        config.scanner.buffer_size_mb = 1;
        config.scanner.batch_size = 100;
        config.narrowing.batch_size = 100;
        config.narrowing.timeout_ms = 1;
        config.memory.max_retry_attempts = 1;
        config.logging.level = "WARN".to_string();
        assert!(validate_config(&config).is_ok());

        config.scanner.min_threads = 64;
        config.scanner.max_threads = 128;
        config.scanner.buffer_size_mb = 1024;
        config.scanner.batch_size = 10_000;
        config.memory.max_retry_attempts = 10;
        assert!(validate_config(&config).is_ok());
    }
}
