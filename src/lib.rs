//! memscan: find, narrow and rewrite values in another process's memory
//!
//! The pipeline is headless. [`Engine`] ties it together for one target;
//! the individual stages live under [`memory`] and can be driven directly.
//! Any [`process::ProcessMemory`] implementation can be scanned, so the same
//! code runs against a live Windows process or a [`process::SimulatedProcess`].

pub mod config;
pub mod core;
pub mod engine;
pub mod logging;
pub mod memory;
pub mod process;
pub mod status;
pub mod windows;

pub use crate::core::types::{
    Address, ErrorCategory, MatchRecord, MemoryError, MemoryResult, MemoryValue, PointerMatch,
    ProcessId, ValueType,
};
pub use crate::core::VERSION;
pub use config::{Config, ConfigError};
pub use engine::{Engine, NarrowSummary, ScanSummary};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_reexports() {
        let addr = Address::new(0x1000);
        assert_eq!(addr.as_usize(), 0x1000);

        let value = MemoryValue::I32(-100);
        assert_eq!(value.value_type(), ValueType::Int32);

        let error = MemoryError::ProcessNotFound("1234".to_string());
        assert_eq!(error.category(), ErrorCategory::Access);

        let pid: ProcessId = 1234;
        assert_eq!(pid, 1234);
    }
}
