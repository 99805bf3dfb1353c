//! Target process access
//!
//! [`ProcessMemory`] is the seam between the scanning pipeline and the OS.
//! On Windows it is backed by [`ProcessHandle`]; [`SimulatedProcess`] gives a
//! deterministic in-memory target for headless use and testing.

#[cfg(windows)]
pub mod handle;
pub mod simulated;

#[cfg(windows)]
pub use handle::{ProcessAccess, ProcessHandle};
pub use simulated::SimulatedProcess;

use crate::core::types::{Address, MemoryResult};
use crate::memory::regions::{ProtectionFlags, RegionInfo};

/// Lowest address a user-mode allocation can occupy
pub const DEFAULT_MIN_APP_ADDRESS: usize = 0x1_0000;
/// Highest user-mode address on 64-bit Windows
pub const DEFAULT_MAX_APP_ADDRESS: usize = 0x7FFF_FFFE_FFFF;

/// Operations the scanner needs from a target process.
///
/// Implementations must be shareable across worker threads.
pub trait ProcessMemory: Send + Sync {
    /// Identifier of the target process
    fn pid(&self) -> u32;

    /// Describes the region containing `address`.
    ///
    /// Returns `Ok(None)` once `address` lies past the end of the address space.
    fn query_region(&self, address: Address) -> MemoryResult<Option<RegionInfo>>;

    /// Reads up to `buffer.len()` bytes and returns how many were read.
    ///
    /// A short count is a partial read, not an error.
    fn read(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<usize>;

    /// Writes `data` and returns how many bytes the OS reported written
    fn write(&self, address: Address, data: &[u8]) -> MemoryResult<usize>;

    /// Changes the protection of the pages covering `address..address+size`
    /// and returns the protection they had before.
    fn protect(
        &self,
        address: Address,
        size: usize,
        protection: ProtectionFlags,
    ) -> MemoryResult<ProtectionFlags>;

    /// Minimum and maximum application addresses
    fn address_range(&self) -> (Address, Address) {
        (
            Address::new(DEFAULT_MIN_APP_ADDRESS),
            Address::new(DEFAULT_MAX_APP_ADDRESS),
        )
    }

    /// Pointer width of the target, in bytes
    fn pointer_width(&self) -> usize {
        8
    }
}

impl<P: ProcessMemory + ?Sized> ProcessMemory for std::sync::Arc<P> {
    fn pid(&self) -> u32 {
        (**self).pid()
    }

    fn query_region(&self, address: Address) -> MemoryResult<Option<RegionInfo>> {
        (**self).query_region(address)
    }

    fn read(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<usize> {
        (**self).read(address, buffer)
    }

    fn write(&self, address: Address, data: &[u8]) -> MemoryResult<usize> {
        (**self).write(address, data)
    }

    fn protect(
        &self,
        address: Address,
        size: usize,
        protection: ProtectionFlags,
    ) -> MemoryResult<ProtectionFlags> {
        (**self).protect(address, size, protection)
    }

    fn address_range(&self) -> (Address, Address) {
        (**self).address_range()
    }

    fn pointer_width(&self) -> usize {
        (**self).pointer_width()
    }
}
