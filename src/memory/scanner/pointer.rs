//! Single-level pointer pass
//!
//! Looks for pointer-sized, pointer-aligned slots whose value lands inside the
//! application address range and whose pointee matches the search target.

use super::chunks::ChunkReader;
use super::session::ScanSession;
use super::worker::Search;
use crate::core::types::{Address, MemoryValue, PointerMatch};
use crate::memory::matcher;
use crate::memory::regions::{classify_region, RegionInfo};
use crate::process::ProcessMemory;
use std::ops::ControlFlow;
use tracing::debug;

/// Scans `regions` for slots pointing at a matching value
pub fn scan_pointers<P: ProcessMemory + ?Sized>(
    process: &P,
    session: &ScanSession,
    regions: &[RegionInfo],
    search: Search,
    buffer_size: usize,
) -> Vec<PointerMatch> {
    let width = process.pointer_width();
    if width != 4 && width != 8 {
        debug!(width, "Unsupported pointer width");
        return Vec::new();
    }
    let (min, max) = process.address_range();
    let mut reader = ChunkReader::new(buffer_size, width - 1);
    let mut found = Vec::new();

    for region in regions {
        if session.is_cancelled() {
            break;
        }
        if let Err(reason) = classify_region(region, false) {
            debug!(base = %region.base_address, %reason, "Skipping region for pointer pass");
            session.add_skipped(1);
            continue;
        }

        let flow = reader.for_each(process, region, |chunk| {
            if session.is_cancelled() {
                return ControlFlow::Break(());
            }
            for offset in chunk.candidates(width, width) {
                let pointer = Address::new(read_pointer(chunk.window(offset), width));
                if pointer < min || pointer > max {
                    continue;
                }
                if let Some(value) = pointee(process, pointer, search) {
                    found.push(PointerMatch {
                        address: chunk.base.add(offset),
                        pointer,
                        value,
                    });
                }
            }
            session.add_bytes(chunk.owned as u64);
            ControlFlow::Continue(())
        });
        match flow {
            ControlFlow::Break(()) => break,
            ControlFlow::Continue(0) => session.add_skipped(1),
            ControlFlow::Continue(_) => session.add_scanned(1),
        }
    }

    session.add_matches(found.len());
    found
}

fn read_pointer(window: &[u8], width: usize) -> usize {
    let mut bytes = [0u8; 8];
    bytes[..width].copy_from_slice(&window[..width]);
    u64::from_le_bytes(bytes) as usize
}

fn pointee<P: ProcessMemory + ?Sized>(
    process: &P,
    pointer: Address,
    search: Search,
) -> Option<MemoryValue> {
    let mut window = [0u8; 8];
    let width = search.value_type.window();
    let read = process.read(pointer, &mut window[..width]).ok()?;
    let matched = matcher::matched_type(&window[..read], search.target, search.value_type)?;
    MemoryValue::from_bytes(&window[..read], matched)
}
