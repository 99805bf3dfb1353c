//! Multi-threaded value scanning
//!
//! A pass enumerates every region of the target, splits the list into
//! contiguous partitions and runs one [`ScanWorker`] per partition on a
//! dedicated rayon pool. Workers share the [`ScanSession`] counters and flush
//! matches into one [`ResultStore`] in batches.

pub mod chunks;
pub mod pointer;
pub mod session;
pub mod worker;

pub use session::{Progress, ScanSession, ScanState};
pub use worker::{ScanWorker, Search};

use crate::config::ScannerConfig;
use crate::core::types::{MemoryError, MemoryResult, PointerMatch, ValueType};
use crate::memory::regions::{enumerate_regions, RegionInfo};
use crate::memory::results::ResultStore;
use crate::process::ProcessMemory;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::time::Instant;
use tracing::{debug, info};

/// Tuning for one scan pass
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Worker threads before clamping to the region count
    pub threads: usize,
    /// Bytes read per chunk
    pub buffer_size: usize,
    /// Local matches collected before a flush
    pub batch_size: usize,
    pub use_vectorized: bool,
    pub scan_unaligned: bool,
    pub detect_auto_type: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            threads: num_cpus::get().max(2),
            buffer_size: 16 * 1024 * 1024,
            batch_size: 1000,
            use_vectorized: true,
            scan_unaligned: false,
            detect_auto_type: false,
        }
    }
}

impl From<&ScannerConfig> for ScanOptions {
    fn from(config: &ScannerConfig) -> Self {
        ScanOptions {
            threads: config.effective_threads(),
            buffer_size: config.buffer_bytes(),
            batch_size: config.batch_size.max(1),
            use_vectorized: config.use_vectorized,
            scan_unaligned: config.scan_unaligned,
            detect_auto_type: config.detect_auto_type,
        }
    }
}

/// Result of a finished or cancelled pass
#[derive(Debug)]
pub struct ScanOutcome {
    pub results: ResultStore,
    pub state: ScanState,
    pub progress: Progress,
}

/// Drives scan passes against one process
pub struct MemoryScanner<'a, P: ProcessMemory + ?Sized> {
    process: &'a P,
    session: &'a ScanSession,
    options: ScanOptions,
}

impl<'a, P: ProcessMemory + ?Sized> MemoryScanner<'a, P> {
    pub fn new(process: &'a P, session: &'a ScanSession, options: ScanOptions) -> Self {
        MemoryScanner {
            process,
            session,
            options,
        }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Scans every eligible region for `target` interpreted as `value_type`.
    ///
    /// Cancellation is not an error: the outcome carries
    /// [`ScanState::Cancelled`] and whatever complete batches were flushed.
    pub fn scan(&self, target: i32, value_type: ValueType) -> MemoryResult<ScanOutcome> {
        let started = Instant::now();
        self.session.reset(ScanState::Enumerating);
        info!(
            pid = self.process.pid(),
            target,
            %value_type,
            "Starting scan"
        );

        let regions = enumerate_regions(self.process);
        self.session.set_total(regions.len());
        self.session.set_state(ScanState::Scanning);

        let store = ResultStore::new();
        if !regions.is_empty() {
            let partitions = self.partition(&regions);
            let pool = self.build_pool(partitions.len())?;
            let search = Search { target, value_type };
            let (process, session, options, store_ref) =
                (self.process, self.session, &self.options, &store);

            pool.scope(|scope| {
                for partition in &partitions {
                    scope.spawn(move |_| {
                        ScanWorker::new(process, session, store_ref, options, search).run(partition);
                    });
                }
            });
        }

        let state = self.session.finish();
        if !store.is_empty() {
            self.session.mark_results_changed();
        }
        let progress = self.session.progress();
        info!(
            state = ?state,
            regions = progress.total,
            scanned = progress.scanned,
            skipped = progress.skipped,
            bytes = progress.bytes_scanned,
            matches = store.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scan finished"
        );

        Ok(ScanOutcome {
            results: store,
            state,
            progress,
        })
    }

    /// Opt-in pass for pointers whose pointee matches `target`
    pub fn scan_pointers(&self, target: i32, value_type: ValueType) -> MemoryResult<Vec<PointerMatch>> {
        self.session.reset(ScanState::Enumerating);
        info!(pid = self.process.pid(), target, %value_type, "Starting pointer scan");

        let regions = enumerate_regions(self.process);
        self.session.set_total(regions.len());
        self.session.set_state(ScanState::Scanning);

        let partitions = self.partition(&regions);
        let pool = self.build_pool(partitions.len().max(1))?;
        let search = Search { target, value_type };
        let buffer_size = self.options.buffer_size;
        let (process, session) = (self.process, self.session);

        let mut found: Vec<PointerMatch> = pool.install(|| {
            partitions
                .par_iter()
                .flat_map_iter(|partition| {
                    pointer::scan_pointers(process, session, partition, search, buffer_size)
                })
                .collect()
        });
        found.sort_by_key(|m| m.address);

        let state = self.session.finish();
        info!(state = ?state, matches = found.len(), "Pointer scan finished");
        Ok(found)
    }

    fn worker_count(&self, regions: usize) -> usize {
        self.options.threads.max(1).min(regions.max(1))
    }

    /// Splits `regions` into contiguous, near-equal partitions
    fn partition(&self, regions: &[RegionInfo]) -> Vec<Vec<RegionInfo>> {
        let workers = self.worker_count(regions.len());
        let per_worker = regions.len().div_ceil(workers).max(1);
        regions.chunks(per_worker).map(<[RegionInfo]>::to_vec).collect()
    }

    fn build_pool(&self, threads: usize) -> MemoryResult<ThreadPool> {
        debug!(threads, "Building scan worker pool");
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("memscan-worker-{}", i))
            .build()
            .map_err(|e| MemoryError::WorkerPool(e.to_string()))
    }
}
