//! Conversion from MEMORY_BASIC_INFORMATION

use crate::core::types::Address;
use crate::memory::regions::{ProtectionFlags, RegionInfo, RegionState, RegionType};
use winapi::um::winnt::MEMORY_BASIC_INFORMATION;

const MEM_COMMIT: u32 = 0x1000;
const MEM_RESERVE: u32 = 0x2000;
const MEM_MAPPED: u32 = 0x40000;
const MEM_IMAGE: u32 = 0x1000000;

/// Translates a VirtualQueryEx result into a region descriptor
pub fn region_from_mbi(mbi: &MEMORY_BASIC_INFORMATION) -> RegionInfo {
    let state = match mbi.State {
        MEM_COMMIT => RegionState::Committed,
        MEM_RESERVE => RegionState::Reserved,
        _ => RegionState::Free,
    };

    let region_type = match mbi.Type {
        MEM_MAPPED => RegionType::Mapped,
        MEM_IMAGE => RegionType::Image,
        _ => RegionType::Private,
    };

    RegionInfo::new(
        Address::new(mbi.BaseAddress as usize),
        mbi.RegionSize,
        state,
        region_type,
        ProtectionFlags::new(mbi.Protect),
    )
}
