//! Core type definitions for memscan
//!
//! Address wrapper, typed values, match records and the error type shared
//! by every other module.

mod address;
mod error;
mod record;
mod value;

pub use address::Address;
pub use error::{ErrorCategory, MemoryError, MemoryResult};
pub use record::{MatchRecord, PointerMatch};
pub use value::{MemoryValue, ValueType};

pub type ProcessId = u32;
