//! Scan match records

use super::{Address, MemoryValue};
use serde::{Deserialize, Serialize};

/// One address that matched a search, with the value seen at match time.
///
/// `original` is fixed at creation; only `value` is ever refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub address: Address,
    pub value: MemoryValue,
    original: MemoryValue,
}

impl MatchRecord {
    /// Record for a fresh match; current and original start equal
    pub fn new(address: Address, value: MemoryValue) -> Self {
        MatchRecord {
            address,
            value,
            original: value,
        }
    }

    /// Record that carries a previously captured original value forward
    pub fn with_original(address: Address, value: MemoryValue, original: MemoryValue) -> Self {
        MatchRecord {
            address,
            value,
            original,
        }
    }

    pub fn original(&self) -> MemoryValue {
        self.original
    }

    /// Whether the live value differs from the value at first match
    pub fn changed(&self) -> bool {
        self.value != self.original
    }
}

/// Result of the single-level pointer pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerMatch {
    /// Slot holding the pointer
    pub address: Address,
    /// Pointer value stored in the slot
    pub pointer: Address,
    /// Value found at the pointee
    pub value: MemoryValue,
}
