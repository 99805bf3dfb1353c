//! Custom error types for memscan

use std::fmt;
use thiserror::Error;

/// Main error type for memory operations
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Invalid memory address: {0}")]
    InvalidAddress(String),

    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Access denied at {address} (OS error {code}): {reason}")]
    AccessDenied {
        address: String,
        code: u32,
        reason: String,
    },

    #[error("Failed to read memory at {address}: {reason}")]
    ReadFailed { address: String, reason: String },

    #[error("Failed to write memory at {address}: {reason}")]
    WriteFailed { address: String, reason: String },

    #[error("Write to {address} requires a protection override ({protection}) but overrides are disabled")]
    ProtectionOverrideDisabled { address: String, protection: String },

    #[error("Verification failed at {address}: expected {expected}, read back {actual}")]
    VerificationMismatch {
        address: String,
        expected: String,
        actual: String,
    },

    #[error("Memory protection error: {0}")]
    ProtectionError(String),

    #[error("Allocation failed: {0}")]
    AllocationFailed(String),

    #[error("Invalid value type: {0}")]
    InvalidValueType(String),

    #[error("A scan or narrow pass is already running")]
    PassInProgress,

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Windows API: {0}")]
    WindowsApi(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for memory operations
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Failure classes a caller can react to without matching every variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The OS refused to open, read, write or re-protect something
    Access,
    /// The result store could not grow
    Allocation,
    /// A write went through but read-back disagreed
    Verification,
    Other,
}

impl MemoryError {
    /// Creates an access denied error
    pub fn access_denied(address: impl fmt::Display, code: u32, reason: impl Into<String>) -> Self {
        MemoryError::AccessDenied {
            address: address.to_string(),
            code,
            reason: reason.into(),
        }
    }

    /// Creates a read failed error
    pub fn read_failed(address: impl fmt::Display, reason: impl Into<String>) -> Self {
        MemoryError::ReadFailed {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a write failed error
    pub fn write_failed(address: impl fmt::Display, reason: impl Into<String>) -> Self {
        MemoryError::WriteFailed {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a verification mismatch error, hex-encoding both byte strings
    pub fn verification_mismatch(address: impl fmt::Display, expected: &[u8], actual: &[u8]) -> Self {
        MemoryError::VerificationMismatch {
            address: address.to_string(),
            expected: hex::encode(expected),
            actual: hex::encode(actual),
        }
    }

    /// Maps the error onto its failure class
    pub fn category(&self) -> ErrorCategory {
        match self {
            MemoryError::AccessDenied { .. }
            | MemoryError::ReadFailed { .. }
            | MemoryError::WriteFailed { .. }
            | MemoryError::ProtectionOverrideDisabled { .. }
            | MemoryError::ProtectionError(_)
            | MemoryError::InvalidHandle(_)
            | MemoryError::ProcessNotFound(_) => ErrorCategory::Access,
            MemoryError::WindowsApi(_) => ErrorCategory::Access,
            MemoryError::AllocationFailed(_) => ErrorCategory::Allocation,
            MemoryError::VerificationMismatch { .. } => ErrorCategory::Verification,
            MemoryError::InvalidAddress(_)
            | MemoryError::InvalidValueType(_)
            | MemoryError::PassInProgress
            | MemoryError::WorkerPool(_)
            | MemoryError::IoError(_)
            | MemoryError::JsonError(_) => ErrorCategory::Other,
        }
    }
}
