//! Shared progress and cancellation state for one scan or narrow pass

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};

/// Lifecycle of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ScanState {
    Idle = 0,
    Enumerating = 1,
    Scanning = 2,
    Narrowing = 3,
    Cancelled = 4,
    Completed = 5,
}

impl ScanState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ScanState::Enumerating,
            2 => ScanState::Scanning,
            3 => ScanState::Narrowing,
            4 => ScanState::Cancelled,
            5 => ScanState::Completed,
            _ => ScanState::Idle,
        }
    }

    /// Whether a pass is in flight
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            ScanState::Enumerating | ScanState::Scanning | ScanState::Narrowing
        )
    }
}

/// Point-in-time copy of the session counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub state: ScanState,
    /// Regions for a scan, input entries for a narrow
    pub total: usize,
    pub scanned: usize,
    pub skipped: usize,
    pub bytes_scanned: u64,
    pub matches_found: usize,
}

impl Progress {
    /// Share of the work finished, in `0.0..=1.0`
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return if self.state == ScanState::Completed { 1.0 } else { 0.0 };
        }
        ((self.scanned + self.skipped) as f64 / self.total as f64).min(1.0)
    }
}

/// Counters owned by the orchestrator and shared with workers and progress
/// readers. Reads are lock-free and may observe a pass mid-flight.
#[derive(Debug)]
pub struct ScanSession {
    state: AtomicU8,
    total: AtomicUsize,
    scanned: AtomicUsize,
    skipped: AtomicUsize,
    bytes_scanned: AtomicU64,
    matches_found: AtomicUsize,
    cancelled: AtomicBool,
    results_changed: AtomicBool,
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanSession {
    pub fn new() -> Self {
        ScanSession {
            state: AtomicU8::new(ScanState::Idle as u8),
            total: AtomicUsize::new(0),
            scanned: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            bytes_scanned: AtomicU64::new(0),
            matches_found: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
            results_changed: AtomicBool::new(false),
        }
    }

    /// Zeroes the counters and clears cancellation for a new pass
    pub fn reset(&self, state: ScanState) {
        self.total.store(0, Ordering::Relaxed);
        self.scanned.store(0, Ordering::Relaxed);
        self.skipped.store(0, Ordering::Relaxed);
        self.bytes_scanned.store(0, Ordering::Relaxed);
        self.matches_found.store(0, Ordering::Relaxed);
        self.cancelled.store(false, Ordering::SeqCst);
        self.set_state(state);
    }

    pub fn state(&self) -> ScanState {
        ScanState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: ScanState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Terminal state for the pass depending on whether cancellation was seen
    pub fn finish(&self) -> ScanState {
        let state = if self.is_cancelled() {
            ScanState::Cancelled
        } else {
            ScanState::Completed
        };
        self.set_state(state);
        state
    }

    /// Requests that the running pass stop at its next checkpoint
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
    }

    pub fn add_scanned(&self, count: usize) {
        self.scanned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn set_scanned(&self, count: usize) {
        self.scanned.store(count, Ordering::Relaxed);
    }

    pub fn add_skipped(&self, count: usize) {
        self.skipped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_bytes(&self, bytes: u64) {
        self.bytes_scanned.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_matches(&self, count: usize) {
        self.matches_found.fetch_add(count, Ordering::Relaxed);
    }

    pub fn mark_results_changed(&self) {
        self.results_changed.store(true, Ordering::Release);
    }

    /// Returns and clears the results-changed flag
    pub fn take_results_changed(&self) -> bool {
        self.results_changed.swap(false, Ordering::AcqRel)
    }

    pub fn progress(&self) -> Progress {
        Progress {
            state: self.state(),
            total: self.total.load(Ordering::Relaxed),
            scanned: self.scanned.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            bytes_scanned: self.bytes_scanned.load(Ordering::Relaxed),
            matches_found: self.matches_found.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_clears_everything() {
        let session = ScanSession::new();
        session.set_total(10);
        session.add_scanned(3);
        session.add_skipped(2);
        session.add_bytes(4096);
        session.add_matches(7);
        session.cancel();

        session.reset(ScanState::Enumerating);
        let progress = session.progress();
        assert_eq!(progress.state, ScanState::Enumerating);
        assert_eq!(progress.total, 0);
        assert_eq!(progress.scanned, 0);
        assert_eq!(progress.bytes_scanned, 0);
        assert!(!session.is_cancelled());
    }

    #[test]
    fn test_fraction() {
        let session = ScanSession::new();
        session.reset(ScanState::Scanning);
        session.set_total(4);
        session.add_scanned(1);
        session.add_skipped(1);
        assert!((session.progress().fraction() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_finish_reflects_cancellation() {
        let session = ScanSession::new();
        session.reset(ScanState::Scanning);
        assert_eq!(session.finish(), ScanState::Completed);

        session.reset(ScanState::Scanning);
        session.cancel();
        assert_eq!(session.finish(), ScanState::Cancelled);
        assert!(!session.state().is_running());
    }

    #[test]
    fn test_results_changed_is_consumed() {
        let session = ScanSession::new();
        assert!(!session.take_results_changed());
        session.mark_results_changed();
        assert!(session.take_results_changed());
        assert!(!session.take_results_changed());
    }
}
