//! Core module containing the fundamental types for memscan

pub mod types;

pub use types::{
    Address, ErrorCategory, MatchRecord, MemoryError, MemoryResult, MemoryValue, PointerMatch,
    ProcessId, ValueType,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
