//! Heuristics for choosing which regions are worth scanning

use crate::memory::regions::{ProtectionFlags, RegionInfo, RegionType};
use std::fmt;

/// Smallest region considered for scanning
pub const MIN_REGION_SIZE: usize = 4096;

/// Why a region was left out of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    TooSmall,
    NotCommitted,
    Guarded,
    NoAccess,
    Unreadable,
    /// Zero searches only look at private memory
    NotPrivate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::TooSmall => "smaller than one page",
            SkipReason::NotCommitted => "not committed",
            SkipReason::Guarded => "guard page",
            SkipReason::NoAccess => "no access",
            SkipReason::Unreadable => "protection not readable",
            SkipReason::NotPrivate => "not private (zero search)",
        };
        f.write_str(text)
    }
}

/// Classifies a region, returning `Err` with the reason it should be skipped.
pub fn classify_region(region: &RegionInfo, searching_for_zero: bool) -> Result<(), SkipReason> {
    if region.size < MIN_REGION_SIZE {
        return Err(SkipReason::TooSmall);
    }
    if !region.is_committed() {
        return Err(SkipReason::NotCommitted);
    }

    let protection = region.protection;
    if protection.is_guard() {
        return Err(SkipReason::Guarded);
    }
    if protection.is_no_access() {
        return Err(SkipReason::NoAccess);
    }
    if !matches!(
        protection.access(),
        ProtectionFlags::PAGE_READONLY
            | ProtectionFlags::PAGE_READWRITE
            | ProtectionFlags::PAGE_EXECUTE_READ
            | ProtectionFlags::PAGE_EXECUTE_READWRITE
    ) {
        return Err(SkipReason::Unreadable);
    }

    if searching_for_zero && region.region_type != RegionType::Private {
        return Err(SkipReason::NotPrivate);
    }

    Ok(())
}

/// Whether a region is likely to hold user data worth scanning
pub fn is_likely_data_region(region: &RegionInfo, searching_for_zero: bool) -> bool {
    classify_region(region, searching_for_zero).is_ok()
}

/// Orders regions so private read-write memory comes first, then larger
/// regions before smaller ones.
pub fn sort_for_scanning(regions: &mut [RegionInfo]) {
    regions.sort_by(|a, b| {
        b.is_private_read_write()
            .cmp(&a.is_private_read_write())
            .then_with(|| b.size.cmp(&a.size))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Address;
    use crate::memory::regions::RegionState;

    fn region(size: usize, protection: u32, region_type: RegionType) -> RegionInfo {
        RegionInfo::new(
            Address::new(0x10000),
            size,
            RegionState::Committed,
            region_type,
            ProtectionFlags::new(protection),
        )
    }

    #[test]
    fn test_accepts_readable_committed() {
        for protection in [
            ProtectionFlags::PAGE_READONLY,
            ProtectionFlags::PAGE_READWRITE,
            ProtectionFlags::PAGE_EXECUTE_READ,
            ProtectionFlags::PAGE_EXECUTE_READWRITE,
        ] {
            assert!(is_likely_data_region(
                &region(0x1000, protection, RegionType::Image),
                false
            ));
        }
    }

    #[test]
    fn test_rejections() {
        assert_eq!(
            classify_region(&region(0xFFF, ProtectionFlags::PAGE_READWRITE, RegionType::Private), false),
            Err(SkipReason::TooSmall)
        );

        let mut reserved = region(0x1000, ProtectionFlags::PAGE_READWRITE, RegionType::Private);
        reserved.state = RegionState::Reserved;
        assert_eq!(classify_region(&reserved, false), Err(SkipReason::NotCommitted));

        let guarded = region(
            0x1000,
            ProtectionFlags::PAGE_READWRITE | ProtectionFlags::PAGE_GUARD,
            RegionType::Private,
        );
        assert_eq!(classify_region(&guarded, false), Err(SkipReason::Guarded));

        assert_eq!(
            classify_region(&region(0x1000, ProtectionFlags::PAGE_NOACCESS, RegionType::Private), false),
            Err(SkipReason::NoAccess)
        );
        assert_eq!(
            classify_region(&region(0x1000, ProtectionFlags::PAGE_EXECUTE, RegionType::Private), false),
            Err(SkipReason::Unreadable)
        );
        assert_eq!(
            classify_region(&region(0x1000, ProtectionFlags::PAGE_WRITECOPY, RegionType::Image), false),
            Err(SkipReason::Unreadable)
        );
    }

    #[test]
    fn test_zero_search_requires_private() {
        let mapped = region(0x1000, ProtectionFlags::PAGE_READWRITE, RegionType::Mapped);
        assert!(is_likely_data_region(&mapped, false));
        assert_eq!(classify_region(&mapped, true), Err(SkipReason::NotPrivate));

        let private = region(0x1000, ProtectionFlags::PAGE_READWRITE, RegionType::Private);
        assert!(is_likely_data_region(&private, true));
    }

    #[test]
    fn test_sort_for_scanning() {
        let mut regions = vec![
            region(0x1000, ProtectionFlags::PAGE_READONLY, RegionType::Image),
            region(0x2000, ProtectionFlags::PAGE_READWRITE, RegionType::Private),
            region(0x8000, ProtectionFlags::PAGE_READONLY, RegionType::Mapped),
            region(0x4000, ProtectionFlags::PAGE_READWRITE, RegionType::Private),
        ];
        sort_for_scanning(&mut regions);
        let sizes: Vec<_> = regions.iter().map(|r| r.size).collect();
        assert_eq!(sizes, vec![0x4000, 0x2000, 0x8000, 0x1000]);
    }
}
