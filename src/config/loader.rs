//! Configuration loader for memscan
//!
//! Handles loading configuration from TOML files and merging with defaults.

use super::defaults::default_config;
use crate::memory::reader::ReadPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// File consulted by [`load_config`]
pub const DEFAULT_CONFIG_FILE: &str = "memscan.toml";

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_scanner")]
    pub scanner: ScannerConfig,

    #[serde(default = "default_narrowing")]
    pub narrowing: NarrowingConfig,

    #[serde(default = "default_memory")]
    pub memory: MemoryConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,
}

/// Scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Worker count; 0 derives it from hardware concurrency
    #[serde(default = "default_thread_count")]
    pub thread_count: usize,
    #[serde(default = "default_min_threads")]
    pub min_threads: usize,
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,
    /// Per-worker read buffer
    #[serde(default = "default_buffer_size_mb")]
    pub buffer_size_mb: usize,
    /// Matches a worker collects before flushing into the shared store
    #[serde(default = "default_scan_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_use_vectorized")]
    pub use_vectorized: bool,
    /// Test every byte offset instead of every element-width offset
    #[serde(default = "default_scan_unaligned")]
    pub scan_unaligned: bool,
    /// Guess the encoding per chunk when scanning with the `auto` type
    #[serde(default = "default_detect_auto_type")]
    pub detect_auto_type: bool,
}

/// Narrowing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrowingConfig {
    #[serde(default = "default_narrow_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Allow writes to temporarily lift page protection
    #[serde(default = "default_overwrite_protection")]
    pub overwrite_protection: bool,
    #[serde(default = "default_verify_writes")]
    pub verify_writes: bool,
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Empty means log to stderr only
    #[serde(default = "default_log_file")]
    pub file: String,
    #[serde(default = "default_log_security_events")]
    pub log_security_events: bool,
}

impl LoggingConfig {
    /// Tracing level for the configured name, which may also be one of the
    /// `warning` or `critical` spellings
    pub fn filter_level(&self) -> Option<&'static str> {
        match self.level.to_lowercase().as_str() {
            "trace" => Some("trace"),
            "debug" => Some("debug"),
            "info" => Some("info"),
            "warn" | "warning" => Some("warn"),
            "error" | "critical" => Some("error"),
            "off" => Some("off"),
            _ => None,
        }
    }
}

impl ScannerConfig {
    /// Worker count before clamping to the number of regions
    pub fn effective_threads(&self) -> usize {
        let requested = if self.thread_count == 0 {
            num_cpus::get()
        } else {
            self.thread_count
        };
        requested.clamp(self.min_threads.max(1), self.max_threads.max(self.min_threads).max(1))
    }

    pub fn buffer_bytes(&self) -> usize {
        self.buffer_size_mb.max(1) * 1024 * 1024
    }
}

impl NarrowingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl MemoryConfig {
    /// Retry policy for verification reads
    pub fn read_policy(&self) -> ReadPolicy {
        ReadPolicy {
            max_attempts: self.max_retry_attempts.max(1),
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

/// Configuration loader
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Creates a new configuration loader
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ConfigLoader {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Loads configuration from file
    pub fn load(&self) -> Result<Config, ConfigError> {
        if !self.config_path.exists() {
            return Err(ConfigError::FileNotFound(
                self.config_path.display().to_string(),
            ));
        }

        let contents = fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Loads configuration or returns defaults if the file doesn't exist.
    ///
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default(&self) -> Result<Config, ConfigError> {
        match self.load() {
            Err(ConfigError::FileNotFound(_)) => Ok(Config::default()),
            other => other,
        }
    }

    /// Saves configuration to file
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, contents)?;
        Ok(())
    }
}

/// Loads configuration from the default location
pub fn load_config() -> Result<Config, ConfigError> {
    ConfigLoader::new(DEFAULT_CONFIG_FILE).load_or_default()
}

// Default functions for serde
fn default_scanner() -> ScannerConfig {
    let defaults = default_config().scanner;
    ScannerConfig {
        thread_count: defaults.thread_count,
        min_threads: defaults.min_threads,
        max_threads: defaults.max_threads,
        buffer_size_mb: defaults.buffer_size_mb,
        batch_size: defaults.batch_size,
        use_vectorized: defaults.use_vectorized,
        scan_unaligned: defaults.scan_unaligned,
        detect_auto_type: defaults.detect_auto_type,
    }
}

fn default_narrowing() -> NarrowingConfig {
    let defaults = default_config().narrowing;
    NarrowingConfig {
        batch_size: defaults.batch_size,
        timeout_ms: defaults.timeout_ms,
    }
}

fn default_memory() -> MemoryConfig {
    let defaults = default_config().memory;
    MemoryConfig {
        overwrite_protection: defaults.overwrite_protection,
        verify_writes: defaults.verify_writes,
        max_retry_attempts: defaults.max_retry_attempts,
        retry_backoff_ms: defaults.retry_backoff_ms,
    }
}

fn default_logging() -> LoggingConfig {
    let defaults = default_config().logging;
    LoggingConfig {
        level: defaults.level,
        file: defaults.file,
        log_security_events: defaults.log_security_events,
    }
}

// Individual field defaults
fn default_thread_count() -> usize {
    default_config().scanner.thread_count
}

fn default_min_threads() -> usize {
    default_config().scanner.min_threads
}

fn default_max_threads() -> usize {
    default_config().scanner.max_threads
}

fn default_buffer_size_mb() -> usize {
    default_config().scanner.buffer_size_mb
}

fn default_scan_batch_size() -> usize {
    default_config().scanner.batch_size
}

fn default_use_vectorized() -> bool {
    default_config().scanner.use_vectorized
}

fn default_scan_unaligned() -> bool {
    default_config().scanner.scan_unaligned
}

fn default_detect_auto_type() -> bool {
    default_config().scanner.detect_auto_type
}

fn default_narrow_batch_size() -> usize {
    default_config().narrowing.batch_size
}

fn default_timeout_ms() -> u64 {
    default_config().narrowing.timeout_ms
}

fn default_overwrite_protection() -> bool {
    default_config().memory.overwrite_protection
}

fn default_verify_writes() -> bool {
    default_config().memory.verify_writes
}

fn default_max_retry_attempts() -> u32 {
    default_config().memory.max_retry_attempts
}

fn default_retry_backoff_ms() -> u64 {
    default_config().memory.retry_backoff_ms
}

fn default_log_level() -> String {
    default_config().logging.level
}

fn default_log_file() -> String {
    default_config().logging.file
}

fn default_log_security_events() -> bool {
    default_config().logging.log_security_events
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scanner: default_scanner(),
            narrowing: default_narrowing(),
            memory: default_memory(),
            logging: default_logging(),
        }
    }
}
