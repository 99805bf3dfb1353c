//! Default configuration values for memscan

use serde::{Deserialize, Serialize};

/// Default configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDefaults {
    pub scanner: ScannerDefaults,
    pub narrowing: NarrowingDefaults,
    pub memory: MemoryDefaults,
    pub logging: LoggingDefaults,
}

/// Default scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerDefaults {
    pub thread_count: usize,
    pub min_threads: usize,
    pub max_threads: usize,
    pub buffer_size_mb: usize,
    pub batch_size: usize,
    pub use_vectorized: bool,
    pub scan_unaligned: bool,
    pub detect_auto_type: bool,
}

/// Default narrowing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrowingDefaults {
    pub batch_size: usize,
    pub timeout_ms: u64,
}

/// Default memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryDefaults {
    pub overwrite_protection: bool,
    pub verify_writes: bool,
    pub max_retry_attempts: u32,
    pub retry_backoff_ms: u64,
}

/// Default logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingDefaults {
    pub level: String,
    pub file: String,
    pub log_security_events: bool,
}

const MIN_THREADS: usize = 2;

/// Returns the default configuration
pub fn default_config() -> ConfigDefaults {
    ConfigDefaults {
        scanner: ScannerDefaults {
            thread_count: 0, // derive from hardware concurrency
            min_threads: MIN_THREADS,
            max_threads: num_cpus::get().max(MIN_THREADS),
            buffer_size_mb: 16,
            batch_size: 1000,
            use_vectorized: true,
            scan_unaligned: false,
            detect_auto_type: false,
        },
        narrowing: NarrowingDefaults {
            batch_size: 500,
            timeout_ms: 5000,
        },
        memory: MemoryDefaults {
            overwrite_protection: false,
            verify_writes: true,
            max_retry_attempts: 3,
            retry_backoff_ms: 5,
        },
        logging: LoggingDefaults {
            level: "info".to_string(),
            file: String::new(),
            log_security_events: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scanner_defaults() {
        let config = default_config();
        assert_eq!(config.scanner.thread_count, 0);
        assert_eq!(config.scanner.min_threads, 2);
        assert!(config.scanner.max_threads >= 2);
        assert_eq!(config.scanner.buffer_size_mb, 16);
        assert_eq!(config.scanner.batch_size, 1000);
        assert!(config.scanner.use_vectorized);
    }

    #[test]
    fn test_memory_defaults() {
        let config = default_config();
        assert!(!config.memory.overwrite_protection);
        assert!(config.memory.verify_writes);
        assert_eq!(config.memory.max_retry_attempts, 3);
        assert_eq!(config.narrowing.timeout_ms, 5000);
        assert_eq!(config.narrowing.batch_size, 500);
    }

    #[test]
    fn test_serialization() {
        let config = default_config();
        let serialized = toml::to_string(&config).unwrap();
        assert!(serialized.contains("buffer_size_mb"));

        let deserialized: ConfigDefaults = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.scanner.batch_size, config.scanner.batch_size);
        assert_eq!(deserialized.logging.level, config.logging.level);
    }
}
