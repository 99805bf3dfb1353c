//! Per-thread scan loop

use super::chunks::{Chunk, ChunkReader};
use super::session::ScanSession;
use super::ScanOptions;
use crate::core::types::{Address, MatchRecord, MemoryValue, ValueType};
use crate::memory::regions::{classify_region, sort_for_scanning, RegionInfo};
use crate::memory::results::ResultStore;
use crate::memory::{comparator, matcher};
use crate::process::ProcessMemory;
use std::ops::ControlFlow;
use tracing::debug;

/// Bytes checked before deciding a region is all zero
pub const ZERO_CHECK_LEN: usize = 16;

/// What a chunk is scanned for
#[derive(Debug, Clone, Copy)]
pub struct Search {
    pub target: i32,
    pub value_type: ValueType,
}

/// Scans one partition of regions and flushes matches into a shared store
pub struct ScanWorker<'a, P: ProcessMemory + ?Sized> {
    process: &'a P,
    session: &'a ScanSession,
    store: &'a ResultStore,
    options: &'a ScanOptions,
    search: Search,
    reader: ChunkReader,
    batch: Vec<MatchRecord>,
}

impl<'a, P: ProcessMemory + ?Sized> ScanWorker<'a, P> {
    pub fn new(
        process: &'a P,
        session: &'a ScanSession,
        store: &'a ResultStore,
        options: &'a ScanOptions,
        search: Search,
    ) -> Self {
        // Enough overlap for the widest window any chunk may test
        let reader = ChunkReader::new(options.buffer_size, ValueType::Auto.window() - 1);
        ScanWorker {
            process,
            session,
            store,
            options,
            search,
            reader,
            batch: Vec::with_capacity(options.batch_size),
        }
    }

    /// Filters, orders and scans `regions`. Completed batches are always
    /// flushed, even when the pass is cancelled part way.
    pub fn run(mut self, regions: &[RegionInfo]) {
        let searching_for_zero = self.search.target == 0;
        let mut eligible = Vec::with_capacity(regions.len());
        for region in regions {
            match classify_region(region, searching_for_zero) {
                Ok(()) => eligible.push(*region),
                Err(reason) => {
                    debug!(
                        base = %region.base_address,
                        size = region.size,
                        %reason,
                        "Skipping region"
                    );
                    self.session.add_skipped(1);
                }
            }
        }
        sort_for_scanning(&mut eligible);

        for region in &eligible {
            if self.session.is_cancelled() {
                break;
            }
            match self.scan_region(region) {
                ControlFlow::Break(()) => break,
                ControlFlow::Continue(0) => {
                    debug!(base = %region.base_address, size = region.size, "Region unreadable, skipped");
                    self.session.add_skipped(1);
                }
                ControlFlow::Continue(_) => self.session.add_scanned(1),
            }
        }

        self.flush();
    }

    /// Returns the bytes of `region` that could be read
    fn scan_region(&mut self, region: &RegionInfo) -> ControlFlow<(), usize> {
        if self.search.target == 0 && self.zero_fast_path(region) {
            return ControlFlow::Continue(region.size);
        }

        let process = self.process;
        let session = self.session;
        let store = self.store;
        let options = self.options;
        let search = self.search;
        let mut found = Vec::new();

        // Split borrows: the reader is driven while the batch is filled
        let ScanWorker { reader, batch, .. } = self;
        reader.for_each(process, region, |chunk| {
            found.clear();
            scan_chunk(process, options, search, &chunk, &mut found);
            if session.is_cancelled() {
                // Drop the partially examined chunk
                return ControlFlow::Break(());
            }
            session.add_bytes(chunk.owned as u64);
            batch.append(&mut found);
            if batch.len() >= options.batch_size {
                flush_into(store, session, batch);
            }
            ControlFlow::Continue(())
        })
    }

    /// Records one match at the base of an all-zero region without scanning it
    fn zero_fast_path(&mut self, region: &RegionInfo) -> bool {
        let head_len = ZERO_CHECK_LEN.min(region.size);
        let mut head = [0u8; ZERO_CHECK_LEN];
        match self.process.read(region.base_address, &mut head[..head_len]) {
            Ok(n) if n == head_len && head[..n].iter().all(|&b| b == 0) => {}
            _ => return false,
        }

        let value = matcher::decode(&head[..head_len], 0, self.search.value_type)
            .unwrap_or(MemoryValue::I32(0));
        debug!(base = %region.base_address, size = region.size, "Zero region fast path");
        self.batch.push(MatchRecord::new(region.base_address, value));
        self.session.add_bytes(region.size as u64);
        if self.batch.len() >= self.options.batch_size {
            self.flush();
        }
        true
    }

    fn flush(&mut self) {
        flush_into(self.store, self.session, &mut self.batch);
    }
}

/// Moves a local batch into the shared store.
///
/// The store logs allocation failures itself; a failed batch is dropped and
/// the store keeps its last valid state.
fn flush_into(store: &ResultStore, session: &ScanSession, batch: &mut Vec<MatchRecord>) {
    if batch.is_empty() {
        return;
    }
    if store.extend_batch(batch).is_ok() {
        session.add_matches(batch.len());
    }
    batch.clear();
}

/// Collects confirmed matches for one chunk in ascending address order
fn scan_chunk<P: ProcessMemory + ?Sized>(
    process: &P,
    options: &ScanOptions,
    search: Search,
    chunk: &Chunk<'_>,
    out: &mut Vec<MatchRecord>,
) {
    let value_type = match search.value_type {
        ValueType::Auto if options.detect_auto_type => {
            matcher::detect_value_type(&chunk.data[..chunk.owned], search.target)
        }
        ty => ty,
    };

    let min_len = value_type.size().unwrap_or(1);
    let stride = if options.scan_unaligned {
        1
    } else {
        value_type.size().unwrap_or(1)
    };

    let mut offsets = Vec::new();
    let vectorized = options.use_vectorized && stride == 4;
    match value_type {
        ValueType::Int32 if vectorized => {
            comparator::match_offsets_i32(chunk.data, search.target, &mut offsets)
        }
        ValueType::Float32 if vectorized => {
            comparator::match_offsets_f32(chunk.data, search.target as f32, &mut offsets)
        }
        _ => offsets.extend(
            chunk
                .candidates(stride, min_len)
                .filter(|&offset| matcher::matches(chunk.window(offset), search.target, value_type)),
        ),
    }

    for offset in offsets.into_iter().filter(|&o| o < chunk.owned) {
        let address = chunk.base.add(offset);
        if let Some(value) = confirm(process, address, search.target, value_type) {
            out.push(MatchRecord::new(address, value));
        }
    }
}

/// Re-reads a candidate right before it is recorded
fn confirm<P: ProcessMemory + ?Sized>(
    process: &P,
    address: Address,
    target: i32,
    value_type: ValueType,
) -> Option<MemoryValue> {
    let mut window = [0u8; 8];
    let width = value_type.window();
    let read = process.read(address, &mut window[..width]).ok()?;
    let matched = matcher::matched_type(&window[..read], target, value_type)?;
    MemoryValue::from_bytes(&window[..read], matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::regions::{ProtectionFlags, RegionState, RegionType};
    use crate::process::SimulatedProcess;

    fn options() -> ScanOptions {
        ScanOptions {
            buffer_size: 0x1000,
            batch_size: 2,
            ..ScanOptions::default()
        }
    }

    fn regions(process: &SimulatedProcess) -> Vec<RegionInfo> {
        crate::memory::regions::enumerate_regions(process)
    }

    fn run(process: &SimulatedProcess, options: &ScanOptions, target: i32, ty: ValueType) -> Vec<MatchRecord> {
        let session = ScanSession::new();
        let store = ResultStore::new();
        let search = Search {
            target,
            value_type: ty,
        };
        ScanWorker::new(process, &session, &store, options, search).run(&regions(process));
        let mut records = store.snapshot();
        records.sort_by_key(|r| r.address);
        records
    }

    #[test]
    fn test_match_across_chunk_boundary() {
        let process = SimulatedProcess::new(1);
        process.add_region(Address::new(0x10000), 0x3000, ProtectionFlags::read_write());
        process.poke(Address::new(0x10FFE), &77i32.to_le_bytes()).unwrap();

        let mut opts = options();
        opts.scan_unaligned = true;
        let records = run(&process, &opts, 77, ValueType::Int32);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, Address::new(0x10FFE));
    }

    #[test]
    fn test_aligned_scan_ignores_unaligned_values() {
        let process = SimulatedProcess::new(1);
        process.add_region(Address::new(0x10000), 0x2000, ProtectionFlags::read_write());
        process.poke(Address::new(0x10102), &77i32.to_le_bytes()).unwrap();
        process.poke(Address::new(0x10200), &77i32.to_le_bytes()).unwrap();

        let records = run(&process, &options(), 77, ValueType::Int32);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, Address::new(0x10200));
    }

    #[test]
    fn test_vectorized_and_scalar_agree() {
        let process = SimulatedProcess::new(1);
        process.add_region(Address::new(0x10000), 0x4000, ProtectionFlags::read_write());
        for offset in [0x0, 0x10, 0x1FFC, 0x2000, 0x3FFC] {
            process.poke(Address::new(0x10000 + offset), &5.0f32.to_le_bytes()).unwrap();
        }

        let mut opts = options();
        let vectorized = run(&process, &opts, 5, ValueType::Float32);
        opts.use_vectorized = false;
        let scalar = run(&process, &opts, 5, ValueType::Float32);
        assert_eq!(vectorized.len(), 5);
        assert_eq!(vectorized, scalar);
    }

    #[test]
    fn test_skipped_regions_are_counted() {
        let process = SimulatedProcess::new(1);
        process.add_region(Address::new(0x10000), 0x1000, ProtectionFlags::read_write());
        process.add_region(Address::new(0x20000), 0x800, ProtectionFlags::read_write());
        process.add_region(Address::new(0x30000), 0x1000, ProtectionFlags::no_access());

        let session = ScanSession::new();
        let store = ResultStore::new();
        let opts = options();
        let search = Search {
            target: 1,
            value_type: ValueType::Int32,
        };
        let all = regions(&process);
        let committed: Vec<_> = all.iter().copied().filter(|r| r.is_committed()).collect();
        ScanWorker::new(&process, &session, &store, &opts, search).run(&committed);

        let progress = session.progress();
        assert_eq!(progress.scanned, 1);
        assert_eq!(progress.skipped, 2);
    }

    #[test]
    fn test_failed_first_read_counts_as_skipped() {
        let process = SimulatedProcess::new(1);
        process.add_region(Address::new(0x10000), 0x1000, ProtectionFlags::read_write());
        // Listed as readable but gone by the time it is read
        let vanished = RegionInfo::new(
            Address::new(0x50000),
            0x1000,
            RegionState::Committed,
            RegionType::Private,
            ProtectionFlags::read_write(),
        );
        let mut listed = regions(&process);
        listed.retain(|r| r.is_committed());
        listed.push(vanished);

        let session = ScanSession::new();
        let store = ResultStore::new();
        let opts = options();
        let search = Search {
            target: 1,
            value_type: ValueType::Int32,
        };
        ScanWorker::new(&process, &session, &store, &opts, search).run(&listed);

        let progress = session.progress();
        assert_eq!(progress.scanned, 1);
        assert_eq!(progress.skipped, 1);
        assert_eq!(progress.bytes_scanned, 0x1000);
    }

    #[test]
    fn test_cancelled_worker_scans_nothing() {
        let process = SimulatedProcess::new(1);
        process.add_region(Address::new(0x10000), 0x1000, ProtectionFlags::read_write());
        process.poke(Address::new(0x10000), &9i32.to_le_bytes()).unwrap();

        let session = ScanSession::new();
        session.cancel();
        let store = ResultStore::new();
        let opts = options();
        let search = Search {
            target: 9,
            value_type: ValueType::Int32,
        };
        ScanWorker::new(&process, &session, &store, &opts, search).run(&regions(&process));
        assert!(store.is_empty());
    }

    #[test]
    fn test_auto_records_matched_type() {
        let process = SimulatedProcess::new(1);
        process.add_region(Address::new(0x10000), 0x1000, ProtectionFlags::read_write());
        process.poke(Address::new(0x10000), &[0xFF; 0x1000]).unwrap();
        process.poke(Address::new(0x10100), &3.0f64.to_le_bytes()).unwrap();

        let records = run(&process, &options(), 3, ValueType::Auto);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, MemoryValue::F64(3.0));
    }
}
