//! Re-filtering a previous result set against a new target
//!
//! Entries are visited in input order. Each survivor carries its original
//! value straight from the input record into the output, so a record's
//! `original` can never drift to a neighbour's.

use crate::config::NarrowingConfig;
use crate::core::types::{MatchRecord, ValueType};
use crate::memory::matcher;
use crate::memory::results::ResultStore;
use crate::memory::scanner::{ScanSession, ScanState};
use crate::process::ProcessMemory;
use crate::status::StatusSink;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Entries between wall-clock checks
const TIMEOUT_CHECK_INTERVAL: usize = 100;

/// Reads slower than this are logged
const SLOW_READ: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy)]
pub struct NarrowOptions {
    pub batch_size: usize,
    pub timeout: Duration,
}

impl Default for NarrowOptions {
    fn default() -> Self {
        NarrowOptions {
            batch_size: 500,
            timeout: Duration::from_millis(5000),
        }
    }
}

impl From<&NarrowingConfig> for NarrowOptions {
    fn from(config: &NarrowingConfig) -> Self {
        NarrowOptions {
            batch_size: config.batch_size.max(1),
            timeout: config.timeout(),
        }
    }
}

/// How a narrowing pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrowCompletion {
    Complete,
    /// The time budget ran out; only the first `processed` entries were examined
    TimedOut,
    Cancelled,
}

#[derive(Debug)]
pub struct NarrowOutcome {
    pub results: ResultStore,
    /// Input entries examined before the pass stopped
    pub processed: usize,
    pub total: usize,
    pub completion: NarrowCompletion,
}

impl NarrowOutcome {
    /// Whether some input entries were never examined
    pub fn is_partial(&self) -> bool {
        self.processed < self.total
    }
}

/// Narrowing engine bound to one process and session
pub struct Narrower<'a, P: ProcessMemory + ?Sized> {
    process: &'a P,
    session: &'a ScanSession,
    status: &'a dyn StatusSink,
    options: NarrowOptions,
}

impl<'a, P: ProcessMemory + ?Sized> Narrower<'a, P> {
    pub fn new(
        process: &'a P,
        session: &'a ScanSession,
        status: &'a dyn StatusSink,
        options: NarrowOptions,
    ) -> Self {
        Narrower {
            process,
            session,
            status,
            options,
        }
    }

    /// Keeps the entries of `previous` whose live value now equals `target`.
    ///
    /// With `ValueType::Auto` each entry is re-read as the type it was
    /// recorded with.
    pub fn narrow(&self, previous: &[MatchRecord], target: i32, value_type: ValueType) -> NarrowOutcome {
        let started = Instant::now();
        let total = previous.len();
        self.session.reset(ScanState::Narrowing);
        self.session.set_total(total);
        info!(entries = total, target, %value_type, "Starting narrowing");

        let results = ResultStore::new();
        let mut batch = Vec::with_capacity(self.options.batch_size);
        let mut processed = 0usize;
        let mut completion = NarrowCompletion::Complete;
        let mut buffer = [0u8; 8];

        for record in previous {
            if self.session.is_cancelled() {
                completion = NarrowCompletion::Cancelled;
                break;
            }
            if processed % TIMEOUT_CHECK_INTERVAL == 0 && started.elapsed() >= self.options.timeout {
                completion = NarrowCompletion::TimedOut;
                break;
            }

            let ty = match value_type {
                ValueType::Auto => record.value.value_type(),
                ty => ty,
            };
            let width = ty.window();

            let read_started = Instant::now();
            let read = self.process.read(record.address, &mut buffer[..width]);
            let read_time = read_started.elapsed();
            if read_time > SLOW_READ {
                debug!(address = %record.address, ms = read_time.as_millis() as u64, "Slow read");
            }
            processed += 1;

            if let Ok(n) = read {
                if n == width && matcher::matches(&buffer[..width], target, ty) {
                    if let Some(value) = matcher::decode(&buffer[..width], target, ty) {
                        batch.push(MatchRecord::with_original(record.address, value, record.original()));
                    }
                }
            }

            if batch.len() >= self.options.batch_size {
                self.flush(&results, &mut batch, processed, total);
            }
        }
        self.flush(&results, &mut batch, processed, total);
        self.session.set_scanned(processed);

        if completion == NarrowCompletion::TimedOut {
            warn!(
                processed,
                total,
                timeout_ms = self.options.timeout.as_millis() as u64,
                "Narrowing timed out"
            );
            self.status.status(&format!(
                "Narrowing timed out: checked {} of {} entries",
                processed, total
            ));
        }

        let state = self.session.finish();
        let kept = results.len();
        info!(
            state = ?state,
            removed = processed - kept,
            kept,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Narrowing complete. Removed {}, kept {}",
            processed - kept,
            kept
        );

        NarrowOutcome {
            results,
            processed,
            total,
            completion,
        }
    }

    fn flush(&self, results: &ResultStore, batch: &mut Vec<MatchRecord>, processed: usize, total: usize) {
        self.session.set_scanned(processed);
        if batch.is_empty() {
            return;
        }
        if results.extend_batch(batch).is_ok() {
            self.session.add_matches(batch.len());
        }
        batch.clear();
        self.status.status(&format!(
            "Narrowing: {}/{} checked, {} kept",
            processed,
            total,
            results.len()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Address, MemoryValue};
    use crate::memory::regions::ProtectionFlags;
    use crate::process::SimulatedProcess;
    use crate::status::{NullStatus, RecordingStatus};

    fn setup(count: usize) -> (SimulatedProcess, Vec<MatchRecord>) {
        let process = SimulatedProcess::new(1);
        process.add_region(Address::new(0x10000), 0x10000, ProtectionFlags::read_write());
        let records = (0..count)
            .map(|i| {
                let address = Address::new(0x10000 + i * 4);
                process.poke(address, &10i32.to_le_bytes()).unwrap();
                MatchRecord::new(address, MemoryValue::I32(10))
            })
            .collect();
        (process, records)
    }

    #[test]
    fn test_keeps_only_new_value() {
        let (process, records) = setup(10);
        process.poke(Address::new(0x10008), &11i32.to_le_bytes()).unwrap();
        process.poke(Address::new(0x10010), &11i32.to_le_bytes()).unwrap();

        let session = ScanSession::new();
        let narrower = Narrower::new(&process, &session, &NullStatus, NarrowOptions::default());
        let outcome = narrower.narrow(&records, 11, ValueType::Int32);

        assert_eq!(outcome.completion, NarrowCompletion::Complete);
        assert!(!outcome.is_partial());
        let kept = outcome.results.snapshot();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].address, Address::new(0x10008));
        assert_eq!(kept[1].address, Address::new(0x10010));
        for record in &kept {
            assert_eq!(record.value, MemoryValue::I32(11));
            assert_eq!(record.original(), MemoryValue::I32(10));
        }
    }

    #[test]
    fn test_batches_report_status() {
        let (process, records) = setup(250);
        let session = ScanSession::new();
        let status = RecordingStatus::new();
        let options = NarrowOptions {
            batch_size: 100,
            ..NarrowOptions::default()
        };
        let outcome = Narrower::new(&process, &session, &status, options).narrow(&records, 10, ValueType::Int32);

        assert_eq!(outcome.results.len(), 250);
        assert_eq!(status.messages().len(), 3);
        assert_eq!(session.progress().scanned, 250);
        assert_eq!(session.state(), ScanState::Completed);
    }

    #[test]
    fn test_zero_budget_times_out_immediately() {
        let (process, records) = setup(20);
        let session = ScanSession::new();
        let options = NarrowOptions {
            batch_size: 500,
            timeout: Duration::ZERO,
        };
        let outcome = Narrower::new(&process, &session, &NullStatus, options).narrow(&records, 10, ValueType::Int32);
        assert_eq!(outcome.completion, NarrowCompletion::TimedOut);
        assert_eq!(outcome.processed, 0);
        assert!(outcome.is_partial());
        assert!(outcome.results.is_empty());
    }

    #[test]
    fn test_auto_uses_recorded_type() {
        let process = SimulatedProcess::new(1);
        process.add_region(Address::new(0x10000), 0x1000, ProtectionFlags::read_write());
        process.poke(Address::new(0x10000), &[20, 0xFF, 0xFF, 0xFF]).unwrap();
        let records = vec![MatchRecord::new(Address::new(0x10000), MemoryValue::U8(19))];

        let session = ScanSession::new();
        let outcome = Narrower::new(&process, &session, &NullStatus, NarrowOptions::default())
            .narrow(&records, 20, ValueType::Auto);
        let kept = outcome.results.snapshot();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].value, MemoryValue::U8(20));
        assert_eq!(kept[0].original(), MemoryValue::U8(19));
    }

    #[test]
    fn test_unreadable_entries_dropped() {
        let (process, mut records) = setup(3);
        records.push(MatchRecord::new(Address::new(0x900000), MemoryValue::I32(10)));
        let session = ScanSession::new();
        let outcome = Narrower::new(&process, &session, &NullStatus, NarrowOptions::default())
            .narrow(&records, 10, ValueType::Int32);
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.processed, 4);
    }
}
