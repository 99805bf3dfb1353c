//! Memory region enumeration and classification
//!
//! Regions are discovered through [`ProcessMemory::query_region`] and
//! filtered with the data-region heuristics in [`filter`] before scanning.
//!
//! [`ProcessMemory::query_region`]: crate::process::ProcessMemory::query_region

pub mod enumerator;
pub mod filter;
pub mod protection;

pub use enumerator::{enumerate_regions, RegionEnumerator, RegionInfo};
pub use filter::{classify_region, is_likely_data_region, sort_for_scanning, SkipReason};
pub use protection::ProtectionFlags;

/// State of a memory region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionState {
    /// Memory is committed and accessible
    Committed,
    /// Memory is reserved but not committed
    Reserved,
    /// Memory is free/unallocated
    Free,
}

/// Type of memory region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionType {
    /// Private memory (heap, stack)
    Private,
    /// Mapped memory (file mapping)
    Mapped,
    /// Image memory (executable/DLL)
    Image,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_state_equality() {
        assert_eq!(RegionState::Committed, RegionState::Committed);
        assert_ne!(RegionState::Committed, RegionState::Reserved);
        assert_ne!(RegionState::Reserved, RegionState::Free);
    }
}
