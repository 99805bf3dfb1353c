//! Scan, narrow and write session for one target process
//!
//! The engine owns the current result set and swaps in a fresh store after
//! every pass. Readers holding an earlier `Arc<ResultStore>` keep a
//! consistent view of the set they were given.

use crate::config::Config;
use crate::core::types::{Address, MemoryError, MemoryResult, MemoryValue, PointerMatch, ValueType};
use crate::memory::narrow::{NarrowCompletion, NarrowOptions, Narrower};
use crate::memory::results::ResultStore;
use crate::memory::scanner::{MemoryScanner, Progress, ScanOptions, ScanSession, ScanState};
use crate::memory::writer::{MemoryWrite, ProtectedWriter, WriteOptions, WriteReport};
use crate::process::ProcessMemory;
use crate::status::{LogStatus, StatusSink};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, TryLockError};
use tracing::{debug, info, warn};

/// Store size above which polling compacts the results
pub const COMPACT_THRESHOLD: usize = 100_000;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScanSummary {
    pub state: ScanState,
    pub matches: usize,
    pub progress: Progress,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct NarrowSummary {
    pub completion: NarrowCompletion,
    pub processed: usize,
    pub total: usize,
    pub kept: usize,
    pub removed: usize,
}

impl NarrowSummary {
    pub fn is_partial(&self) -> bool {
        self.processed < self.total
    }
}

pub struct Engine<P: ProcessMemory> {
    process: Arc<P>,
    config: Config,
    session: Arc<ScanSession>,
    results: RwLock<Arc<ResultStore>>,
    value_type: Mutex<ValueType>,
    status: Arc<dyn StatusSink>,
    // Held for the duration of a scan or narrow pass
    pass: Mutex<()>,
}

impl<P: ProcessMemory> Engine<P> {
    pub fn new(process: Arc<P>, config: Config) -> Self {
        Self::with_status(process, config, Arc::new(LogStatus))
    }

    pub fn with_status(process: Arc<P>, config: Config, status: Arc<dyn StatusSink>) -> Self {
        Engine {
            process,
            config,
            session: Arc::new(ScanSession::new()),
            results: RwLock::new(Arc::new(ResultStore::new())),
            value_type: Mutex::new(ValueType::Int32),
            status,
            pass: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn process(&self) -> &Arc<P> {
        &self.process
    }

    /// Shared session, for cancelling from another thread
    pub fn session(&self) -> Arc<ScanSession> {
        Arc::clone(&self.session)
    }

    /// Type used by the last scan, and by narrowing and refreshes after it
    pub fn value_type(&self) -> ValueType {
        *self.value_type.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin_pass(&self) -> MemoryResult<MutexGuard<'_, ()>> {
        match self.pass.try_lock() {
            Ok(guard) => Ok(guard),
            // A pass that panicked still released the lock
            Err(TryLockError::Poisoned(e)) => {
                warn!("Previous pass panicked, starting a new one");
                Ok(e.into_inner())
            }
            Err(TryLockError::WouldBlock) => Err(MemoryError::PassInProgress),
        }
    }

    fn swap_results(&self, store: ResultStore) {
        let mut current = self.results.write().unwrap_or_else(|e| e.into_inner());
        *current = Arc::new(store);
        drop(current);
        self.session.mark_results_changed();
    }

    /// Full scan for `target`; replaces the current results
    pub fn scan(&self, target: i32, value_type: ValueType) -> MemoryResult<ScanSummary> {
        let _pass = self.begin_pass()?;
        let options = ScanOptions::from(&self.config.scanner);
        let scanner = MemoryScanner::new(self.process.as_ref(), &self.session, options);
        let outcome = scanner.scan(target, value_type)?;

        let matches = outcome.results.len();
        *self.value_type.lock().unwrap_or_else(|e| e.into_inner()) = value_type;
        self.swap_results(outcome.results);

        match outcome.state {
            ScanState::Cancelled => self
                .status
                .status(&format!("Scan cancelled, {} matches so far", matches)),
            _ => self.status.status(&format!("Found {} matches", matches)),
        }

        Ok(ScanSummary {
            state: outcome.state,
            matches,
            progress: outcome.progress,
        })
    }

    /// Keeps only current results whose value is now `target`.
    ///
    /// A timed-out pass still replaces the results with the survivors found
    /// so far and says so through [`NarrowSummary::is_partial`]. A cancelled
    /// pass leaves the results untouched.
    pub fn narrow(&self, target: i32) -> MemoryResult<NarrowSummary> {
        let _pass = self.begin_pass()?;
        let previous = self.results().snapshot();
        let options = NarrowOptions::from(&self.config.narrowing);
        let narrower = Narrower::new(self.process.as_ref(), &self.session, self.status.as_ref(), options);
        let outcome = narrower.narrow(&previous, target, self.value_type());

        let kept = outcome.results.len();
        let summary = NarrowSummary {
            completion: outcome.completion,
            processed: outcome.processed,
            total: outcome.total,
            kept,
            removed: outcome.processed - kept,
        };

        match outcome.completion {
            NarrowCompletion::Cancelled => {
                self.status.status("Narrowing cancelled, results unchanged");
            }
            NarrowCompletion::TimedOut => {
                self.swap_results(outcome.results);
                self.status.status(&format!(
                    "Partial result: {} matches from {} of {} entries",
                    kept, summary.processed, summary.total
                ));
            }
            NarrowCompletion::Complete => {
                self.swap_results(outcome.results);
                self.status.status(&format!("Narrowed to {} matches", kept));
            }
        }
        Ok(summary)
    }

    /// Writes `value` at `address` through the protected write path
    pub fn write(&self, address: Address, value: &MemoryValue) -> MemoryResult<WriteReport> {
        let writer = ProtectedWriter::new(self.process.as_ref(), WriteOptions::from(&self.config.memory));
        let result = writer.write_value(address, value);
        match &result {
            Ok(_) => self.status.status(&format!("Wrote {} to {}", value, address)),
            Err(e) => self.status.status(&format!("Write to {} failed: {}", address, e)),
        }
        result
    }

    /// Re-reads every result and updates current values in place
    pub fn refresh_values(&self) -> usize {
        let changed = self
            .results()
            .refresh_values(self.process.as_ref(), self.value_type());
        if changed > 0 {
            self.session.mark_results_changed();
        }
        debug!(changed, "Refreshed result values");
        changed
    }

    pub fn cancel(&self) {
        info!("Cancellation requested");
        self.session.cancel();
    }

    pub fn progress(&self) -> Progress {
        self.session.progress()
    }

    pub fn results(&self) -> Arc<ResultStore> {
        Arc::clone(&self.results.read().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn clear_results(&self) {
        self.swap_results(ResultStore::new());
    }

    pub fn compact_results(&self) -> bool {
        self.results().compact()
    }

    /// Consumes the results-changed flag, compacting large stores
    pub fn poll_results_changed(&self) -> bool {
        if !self.session.take_results_changed() {
            return false;
        }
        let results = self.results();
        if results.len() > COMPACT_THRESHOLD && results.compact() {
            debug!(entries = results.len(), "Compacted results after update");
        }
        true
    }

    /// Single-level pointer scan; leaves the current results alone
    pub fn pointer_scan(&self, target: i32, value_type: ValueType) -> MemoryResult<Vec<PointerMatch>> {
        let _pass = self.begin_pass()?;
        let options = ScanOptions::from(&self.config.scanner);
        let scanner = MemoryScanner::new(self.process.as_ref(), &self.session, options);
        let found = scanner.scan_pointers(target, value_type)?;
        self.status
            .status(&format!("Found {} pointers to {}", found.len(), target));
        Ok(found)
    }
}
