//! Live Windows process backed by kernel32

use crate::core::types::{Address, MemoryResult};
use crate::memory::regions::{ProtectionFlags, RegionInfo};
use crate::process::ProcessMemory;
use crate::windows::bindings::kernel32;
use crate::windows::types::{region_from_mbi, Handle};
use std::fmt;
use tracing::debug;

/// Access rights for process handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessAccess {
    value: u32,
}

impl ProcessAccess {
    pub const QUERY_INFORMATION: Self = Self { value: 0x0400 };
    pub const VM_READ: Self = Self { value: 0x0010 };
    pub const VM_WRITE: Self = Self { value: 0x0020 };
    pub const VM_OPERATION: Self = Self { value: 0x0008 };

    /// Combine access rights
    pub fn combine(rights: &[Self]) -> Self {
        Self {
            value: rights.iter().fold(0, |acc, r| acc | r.value),
        }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn allows(&self, other: Self) -> bool {
        (self.value & other.value) == other.value
    }
}

/// An opened target process
pub struct ProcessHandle {
    handle: Handle,
    pid: u32,
    access: ProcessAccess,
    address_range: (Address, Address),
}

impl ProcessHandle {
    /// Open a process with specified access rights
    pub fn open(pid: u32, access: ProcessAccess) -> MemoryResult<Self> {
        let raw = kernel32::open_process(pid, access.value())?;
        let handle = Handle::from_raw(raw)?;
        let (min, max) = kernel32::application_address_range();
        debug!(pid, access = format_args!("0x{:X}", access.value()), "Opened process");
        Ok(ProcessHandle {
            handle,
            pid,
            access,
            address_range: (Address::new(min), Address::new(max)),
        })
    }

    /// Open a process for scanning only
    pub fn open_for_read(pid: u32) -> MemoryResult<Self> {
        Self::open(
            pid,
            ProcessAccess::combine(&[ProcessAccess::QUERY_INFORMATION, ProcessAccess::VM_READ]),
        )
    }

    /// Open a process for scanning and protected writes
    pub fn open_for_read_write(pid: u32) -> MemoryResult<Self> {
        Self::open(
            pid,
            ProcessAccess::combine(&[
                ProcessAccess::QUERY_INFORMATION,
                ProcessAccess::VM_READ,
                ProcessAccess::VM_WRITE,
                ProcessAccess::VM_OPERATION,
            ]),
        )
    }

    pub fn access(&self) -> ProcessAccess {
        self.access
    }
}

impl ProcessMemory for ProcessHandle {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn query_region(&self, address: Address) -> MemoryResult<Option<RegionInfo>> {
        let mbi = unsafe { kernel32::virtual_query_ex(self.handle.raw(), address.as_usize())? };
        Ok(mbi.as_ref().map(region_from_mbi))
    }

    fn read(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<usize> {
        unsafe { kernel32::read_process_memory(self.handle.raw(), address.as_usize(), buffer) }
    }

    fn write(&self, address: Address, data: &[u8]) -> MemoryResult<usize> {
        unsafe { kernel32::write_process_memory(self.handle.raw(), address.as_usize(), data) }
    }

    fn protect(
        &self,
        address: Address,
        size: usize,
        protection: ProtectionFlags,
    ) -> MemoryResult<ProtectionFlags> {
        let old = unsafe {
            kernel32::virtual_protect_ex(
                self.handle.raw(),
                address.as_usize(),
                size,
                protection.raw(),
            )?
        };
        Ok(ProtectionFlags::new(old))
    }

    fn address_range(&self) -> (Address, Address) {
        self.address_range
    }

    fn pointer_width(&self) -> usize {
        std::mem::size_of::<usize>()
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("access", &format!("0x{:X}", self.access.value()))
            .finish()
    }
}
