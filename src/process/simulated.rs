//! In-memory stand-in for a target process
//!
//! Regions are plain byte vectors keyed by base address. Reads and writes obey
//! the same protection rules the Windows backend sees from the OS, and the
//! fault switches let callers exercise the failure paths of the write pipeline.

use crate::core::types::{Address, MemoryError, MemoryResult};
use crate::memory::regions::{ProtectionFlags, RegionInfo, RegionState, RegionType};
use crate::process::{ProcessMemory, DEFAULT_MAX_APP_ADDRESS, DEFAULT_MIN_APP_ADDRESS};
use crate::windows::utils::error_codes::{ERROR_INVALID_PARAMETER, ERROR_NOACCESS, ERROR_PARTIAL_COPY};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug)]
struct SimRegion {
    data: Vec<u8>,
    state: RegionState,
    region_type: RegionType,
    protection: ProtectionFlags,
}

#[derive(Debug, Default)]
struct Faults {
    fail_writes: AtomicBool,
    corrupt_writes: AtomicBool,
    fail_protect: AtomicBool,
    reject_guard_protect: AtomicBool,
}

/// A fake process whose address space lives in this process's heap
#[derive(Debug)]
pub struct SimulatedProcess {
    pid: u32,
    regions: RwLock<BTreeMap<usize, SimRegion>>,
    min_address: Address,
    max_address: Address,
    pointer_width: usize,
    bytes_read: AtomicU64,
    read_calls: AtomicU64,
    protect_calls: AtomicU64,
    faults: Faults,
}

impl SimulatedProcess {
    pub fn new(pid: u32) -> Self {
        SimulatedProcess {
            pid,
            regions: RwLock::new(BTreeMap::new()),
            min_address: Address::new(DEFAULT_MIN_APP_ADDRESS),
            max_address: Address::new(DEFAULT_MAX_APP_ADDRESS),
            pointer_width: 8,
            bytes_read: AtomicU64::new(0),
            read_calls: AtomicU64::new(0),
            protect_calls: AtomicU64::new(0),
            faults: Faults::default(),
        }
    }

    /// Overrides the application address range
    pub fn with_address_range(mut self, min: Address, max: Address) -> Self {
        self.min_address = min;
        self.max_address = max;
        self
    }

    pub fn with_pointer_width(mut self, width: usize) -> Self {
        self.pointer_width = width;
        self
    }

    /// Adds a zero-filled, committed, private region
    pub fn add_region(&self, base: Address, size: usize, protection: ProtectionFlags) {
        self.add_region_with(base, size, protection, RegionType::Private, RegionState::Committed);
    }

    /// Adds a zero-filled region with explicit type and state.
    ///
    /// Overlapping an existing region replaces it.
    pub fn add_region_with(
        &self,
        base: Address,
        size: usize,
        protection: ProtectionFlags,
        region_type: RegionType,
        state: RegionState,
    ) {
        self.regions_mut().insert(
            base.as_usize(),
            SimRegion {
                data: vec![0; size],
                state,
                region_type,
                protection,
            },
        );
    }

    /// Writes bytes as the target process itself would, ignoring protection
    pub fn poke(&self, address: Address, bytes: &[u8]) -> MemoryResult<()> {
        let mut regions = self.regions_mut();
        let (base, region) = regions
            .range_mut(..=address.as_usize())
            .next_back()
            .ok_or_else(|| MemoryError::InvalidAddress(address.to_string()))?;
        let offset = address.as_usize() - *base;
        let end = offset + bytes.len();
        if end > region.data.len() {
            return Err(MemoryError::InvalidAddress(address.to_string()));
        }
        region.data[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Reads bytes ignoring protection
    pub fn peek(&self, address: Address, len: usize) -> Option<Vec<u8>> {
        let regions = self.regions();
        let (base, region) = regions.range(..=address.as_usize()).next_back()?;
        let offset = address.as_usize() - *base;
        region.data.get(offset..offset + len).map(<[u8]>::to_vec)
    }

    /// Current protection of the region containing `address`
    pub fn protection_at(&self, address: Address) -> Option<ProtectionFlags> {
        self.find(&self.regions(), address).map(|(_, r)| r.protection)
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    pub fn read_calls(&self) -> u64 {
        self.read_calls.load(Ordering::Relaxed)
    }

    pub fn protect_calls(&self) -> u64 {
        self.protect_calls.load(Ordering::Relaxed)
    }

    pub fn reset_counters(&self) {
        self.bytes_read.store(0, Ordering::Relaxed);
        self.read_calls.store(0, Ordering::Relaxed);
        self.protect_calls.store(0, Ordering::Relaxed);
    }

    /// Makes every write report failure
    pub fn set_fail_writes(&self, enabled: bool) {
        self.faults.fail_writes.store(enabled, Ordering::Relaxed);
    }

    /// Makes writes land with the last byte flipped
    pub fn set_corrupt_writes(&self, enabled: bool) {
        self.faults.corrupt_writes.store(enabled, Ordering::Relaxed);
    }

    /// Makes every protection change fail
    pub fn set_fail_protect(&self, enabled: bool) {
        self.faults.fail_protect.store(enabled, Ordering::Relaxed);
    }

    /// Rejects writable protection values carrying `PAGE_GUARD` with
    /// `ERROR_INVALID_PARAMETER`
    pub fn set_reject_guard_protect(&self, enabled: bool) {
        self.faults.reject_guard_protect.store(enabled, Ordering::Relaxed);
    }

    fn regions(&self) -> RwLockReadGuard<'_, BTreeMap<usize, SimRegion>> {
        self.regions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn regions_mut(&self) -> RwLockWriteGuard<'_, BTreeMap<usize, SimRegion>> {
        self.regions.write().unwrap_or_else(|e| e.into_inner())
    }

    fn find<'m>(
        &self,
        regions: &'m BTreeMap<usize, SimRegion>,
        address: Address,
    ) -> Option<(usize, &'m SimRegion)> {
        let (base, region) = regions.range(..=address.as_usize()).next_back()?;
        (address.as_usize() < base + region.data.len()).then_some((*base, region))
    }
}

impl ProcessMemory for SimulatedProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn query_region(&self, address: Address) -> MemoryResult<Option<RegionInfo>> {
        if address > self.max_address {
            return Ok(None);
        }

        let regions = self.regions();
        if let Some((base, region)) = self.find(&regions, address) {
            return Ok(Some(RegionInfo::new(
                Address::new(base),
                region.data.len(),
                region.state,
                region.region_type,
                region.protection,
            )));
        }

        // Free gap between the previous region's end and the next region's base
        let gap_start = regions
            .range(..=address.as_usize())
            .next_back()
            .map(|(base, r)| base + r.data.len())
            .unwrap_or(address.as_usize());
        let gap_end = regions
            .range(address.as_usize()..)
            .next()
            .map(|(base, _)| *base)
            .unwrap_or_else(|| self.max_address.as_usize().saturating_add(1));

        Ok(Some(RegionInfo::new(
            Address::new(gap_start),
            gap_end - gap_start,
            RegionState::Free,
            RegionType::Private,
            ProtectionFlags::no_access(),
        )))
    }

    fn read(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<usize> {
        self.read_calls.fetch_add(1, Ordering::Relaxed);

        let regions = self.regions();
        let (base, region) = self
            .find(&regions, address)
            .ok_or_else(|| MemoryError::read_failed(address, "address not mapped"))?;
        if region.state != RegionState::Committed || !region.protection.is_readable() {
            return Err(MemoryError::access_denied(
                address,
                ERROR_PARTIAL_COPY,
                format!("page not readable ({})", region.protection),
            ));
        }

        let offset = address.as_usize() - base;
        let available = region.data.len() - offset;
        let count = buffer.len().min(available);
        buffer[..count].copy_from_slice(&region.data[offset..offset + count]);
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
        Ok(count)
    }

    fn write(&self, address: Address, data: &[u8]) -> MemoryResult<usize> {
        if self.faults.fail_writes.load(Ordering::Relaxed) {
            return Err(MemoryError::write_failed(address, "write rejected"));
        }

        let mut regions = self.regions_mut();
        let (base, region) = regions
            .range_mut(..=address.as_usize())
            .next_back()
            .filter(|(base, r)| address.as_usize() < *base + r.data.len())
            .ok_or_else(|| MemoryError::write_failed(address, "address not mapped"))?;
        if region.state != RegionState::Committed
            || !region.protection.is_writable()
            || region.protection.is_guard()
        {
            return Err(MemoryError::access_denied(
                address,
                ERROR_NOACCESS,
                format!("page not writable ({})", region.protection),
            ));
        }

        let offset = address.as_usize() - *base;
        let count = data.len().min(region.data.len() - offset);
        region.data[offset..offset + count].copy_from_slice(&data[..count]);
        if count > 0 && self.faults.corrupt_writes.load(Ordering::Relaxed) {
            region.data[offset + count - 1] ^= 0xFF;
        }
        Ok(count)
    }

    fn protect(
        &self,
        address: Address,
        _size: usize,
        protection: ProtectionFlags,
    ) -> MemoryResult<ProtectionFlags> {
        self.protect_calls.fetch_add(1, Ordering::Relaxed);

        if self.faults.fail_protect.load(Ordering::Relaxed) {
            return Err(MemoryError::ProtectionError(format!(
                "protection change at {} rejected",
                address
            )));
        }
        if protection.is_guard()
            && protection.is_writable()
            && self.faults.reject_guard_protect.load(Ordering::Relaxed)
        {
            return Err(MemoryError::access_denied(
                address,
                ERROR_INVALID_PARAMETER,
                "The parameter is incorrect.",
            ));
        }

        let mut regions = self.regions_mut();
        let (_, region) = regions
            .range_mut(..=address.as_usize())
            .next_back()
            .filter(|(base, r)| address.as_usize() < *base + r.data.len())
            .ok_or_else(|| MemoryError::ProtectionError(format!("{} is not mapped", address)))?;
        if region.state != RegionState::Committed {
            return Err(MemoryError::ProtectionError(format!(
                "{} is not committed",
                address
            )));
        }

        let old = region.protection;
        region.protection = protection;
        Ok(old)
    }

    fn address_range(&self) -> (Address, Address) {
        (self.min_address, self.max_address)
    }

    fn pointer_width(&self) -> usize {
        self.pointer_width
    }
}
