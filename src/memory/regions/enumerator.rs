//! Memory region enumeration functionality

use crate::core::types::Address;
use crate::memory::regions::{ProtectionFlags, RegionState, RegionType};
use crate::process::ProcessMemory;
use tracing::debug;

/// Information about a memory region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionInfo {
    /// Base address of the region
    pub base_address: Address,
    /// Size of the region in bytes
    pub size: usize,
    /// Current state of the region
    pub state: RegionState,
    /// Type of the region
    pub region_type: RegionType,
    /// Protection flags for the region
    pub protection: ProtectionFlags,
}

impl RegionInfo {
    pub fn new(
        base_address: Address,
        size: usize,
        state: RegionState,
        region_type: RegionType,
        protection: ProtectionFlags,
    ) -> Self {
        RegionInfo {
            base_address,
            size,
            state,
            region_type,
            protection,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.state == RegionState::Committed
    }

    pub fn is_readable(&self) -> bool {
        self.is_committed() && self.protection.is_readable()
    }

    pub fn is_writable(&self) -> bool {
        self.protection.is_writable()
    }

    pub fn is_guarded(&self) -> bool {
        self.protection.is_guard()
    }

    /// Private read-write memory, the likeliest home of user data
    pub fn is_private_read_write(&self) -> bool {
        self.region_type == RegionType::Private
            && self.protection.access() == ProtectionFlags::PAGE_READWRITE
    }

    /// First address past the region
    pub fn end_address(&self) -> Address {
        self.base_address.add(self.size)
    }

    /// Check if an address is within this region
    pub fn contains(&self, address: Address) -> bool {
        address >= self.base_address && address < self.end_address()
    }
}

/// Walks a process address space one region at a time.
///
/// Each step queries the region at the cursor and advances to its end. The
/// walk stops at the maximum application address, at the end of the address
/// space, or at the first failed query.
pub struct RegionEnumerator<'a, P: ProcessMemory + ?Sized> {
    process: &'a P,
    current_address: Address,
    max_address: Address,
    finished: bool,
}

impl<'a, P: ProcessMemory + ?Sized> RegionEnumerator<'a, P> {
    /// Enumerator over the process's application address range
    pub fn new(process: &'a P) -> Self {
        let (min, max) = process.address_range();
        RegionEnumerator {
            process,
            current_address: min,
            max_address: max,
            finished: false,
        }
    }

    /// Set the starting address for enumeration
    pub fn set_start_address(&mut self, address: Address) {
        self.current_address = address;
    }

    /// Set the maximum address for enumeration
    pub fn set_max_address(&mut self, address: Address) {
        self.max_address = address;
    }

    fn next_region(&mut self) -> Option<RegionInfo> {
        if self.finished || self.current_address >= self.max_address {
            return None;
        }

        match self.process.query_region(self.current_address) {
            Ok(Some(region)) => {
                let next = region.end_address();
                if next <= self.current_address {
                    self.finished = true;
                } else {
                    self.current_address = next;
                }
                Some(region)
            }
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                debug!(address = %self.current_address, error = %e, "Region query failed, ending enumeration");
                self.finished = true;
                None
            }
        }
    }
}

impl<P: ProcessMemory + ?Sized> Iterator for RegionEnumerator<'_, P> {
    type Item = RegionInfo;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_region()
    }
}

/// Collect every region of the process
pub fn enumerate_regions<P: ProcessMemory + ?Sized>(process: &P) -> Vec<RegionInfo> {
    RegionEnumerator::new(process).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::SimulatedProcess;

    #[test]
    fn test_region_helpers() {
        let region = RegionInfo::new(
            Address::new(0x10000),
            0x1000,
            RegionState::Committed,
            RegionType::Private,
            ProtectionFlags::read_write(),
        );
        assert!(region.is_readable());
        assert!(region.is_writable());
        assert!(region.is_private_read_write());
        assert_eq!(region.end_address(), Address::new(0x11000));
        assert!(region.contains(Address::new(0x10FFF)));
        assert!(!region.contains(Address::new(0x11000)));
    }

    #[test]
    fn test_enumeration_covers_gaps() {
        let process = SimulatedProcess::new(1);
        process.add_region(Address::new(0x20000), 0x2000, ProtectionFlags::read_write());
        process.add_region(Address::new(0x40000), 0x1000, ProtectionFlags::read_only());

        let regions = enumerate_regions(&process);
        let committed: Vec<_> = regions.iter().filter(|r| r.is_committed()).collect();
        assert_eq!(committed.len(), 2);
        assert_eq!(committed[0].base_address, Address::new(0x20000));
        assert_eq!(committed[1].base_address, Address::new(0x40000));

        // Free gaps are reported between and around committed regions
        assert!(regions.iter().any(|r| r.state == RegionState::Free));
        for pair in regions.windows(2) {
            assert_eq!(pair[0].end_address(), pair[1].base_address);
        }
    }

    #[test]
    fn test_enumeration_respects_bounds() {
        let process = SimulatedProcess::new(1);
        process.add_region(Address::new(0x20000), 0x1000, ProtectionFlags::read_write());
        process.add_region(Address::new(0x80000), 0x1000, ProtectionFlags::read_write());

        let mut enumerator = RegionEnumerator::new(&process);
        enumerator.set_start_address(Address::new(0x20000));
        enumerator.set_max_address(Address::new(0x21000));
        let regions: Vec<_> = enumerator.collect();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].base_address, Address::new(0x20000));
    }
}
