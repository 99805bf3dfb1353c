//! Thread-safe, growable collection of scan matches
//!
//! Capacity is tracked explicitly: it starts at [`INITIAL_CAPACITY`], doubles
//! whenever an append would overflow it, and shrinks through [`ResultStore::compact`]
//! once occupancy falls under half. Every mutation goes through one mutex.

use crate::core::types::{Address, MatchRecord, MemoryError, MemoryResult, ValueType};
use crate::memory::matcher;
use crate::process::ProcessMemory;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error};

/// Entries reserved by a fresh store
pub const INITIAL_CAPACITY: usize = 1024;

#[derive(Debug)]
struct Inner {
    entries: Vec<MatchRecord>,
    capacity: usize,
}

impl Inner {
    fn ensure_room(&mut self, additional: usize) -> MemoryResult<()> {
        let needed = self
            .entries
            .len()
            .checked_add(additional)
            .ok_or_else(|| MemoryError::AllocationFailed("result count overflow".to_string()))?;
        if needed <= self.capacity {
            return Ok(());
        }

        let mut new_capacity = self.capacity.max(1);
        while new_capacity < needed {
            new_capacity = new_capacity.checked_mul(2).ok_or_else(|| {
                MemoryError::AllocationFailed("result capacity overflow".to_string())
            })?;
        }

        self.entries
            .try_reserve_exact(new_capacity - self.entries.len())
            .map_err(|e| {
                error!(capacity = new_capacity, error = %e, "Failed to grow result store");
                MemoryError::AllocationFailed(format!(
                    "growing result store to {} entries: {}",
                    new_capacity, e
                ))
            })?;
        debug!(from = self.capacity, to = new_capacity, "Result store grown");
        self.capacity = new_capacity;
        Ok(())
    }
}

/// Ordered, append-only-until-cleared set of [`MatchRecord`]s
#[derive(Debug)]
pub struct ResultStore {
    inner: Mutex<Inner>,
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultStore {
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    /// Store with an explicit starting capacity; zero is raised to one
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        ResultStore {
            inner: Mutex::new(Inner {
                entries: Vec::with_capacity(capacity),
                capacity,
            }),
        }
    }

    /// Builds a store holding exactly `records`
    pub fn from_records(records: Vec<MatchRecord>) -> Self {
        let capacity = records.len().max(INITIAL_CAPACITY);
        let mut entries = records;
        entries.reserve_exact(capacity - entries.len());
        ResultStore {
            inner: Mutex::new(Inner { entries, capacity }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends one record, doubling capacity when full.
    ///
    /// On allocation failure the store is left unchanged.
    pub fn append(&self, record: MatchRecord) -> MemoryResult<()> {
        let mut inner = self.lock();
        inner.ensure_room(1)?;
        inner.entries.push(record);
        Ok(())
    }

    /// Appends a batch under a single lock acquisition.
    ///
    /// All or nothing: a failed growth leaves the store as it was.
    pub fn extend_batch(&self, batch: &[MatchRecord]) -> MemoryResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut inner = self.lock();
        inner.ensure_room(batch.len())?;
        inner.entries.extend_from_slice(batch);
        Ok(())
    }

    /// Drops every entry and returns to the initial capacity
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries = Vec::with_capacity(INITIAL_CAPACITY);
        inner.capacity = INITIAL_CAPACITY;
    }

    /// Shrinks capacity to `max(1024, count * 2)` when fewer than half the
    /// slots are used. Returns whether anything changed.
    pub fn compact(&self) -> bool {
        let mut inner = self.lock();
        let count = inner.entries.len();
        if count == 0 || count >= inner.capacity / 2 {
            return false;
        }

        let target = INITIAL_CAPACITY.max(count.saturating_mul(2));
        if target >= inner.capacity {
            return false;
        }

        inner.entries.shrink_to(target);
        debug!(from = inner.capacity, to = target, count, "Result store compacted");
        inner.capacity = target;
        true
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Copy of the current entries
    pub fn snapshot(&self) -> Vec<MatchRecord> {
        self.lock().entries.clone()
    }

    pub fn get(&self, index: usize) -> Option<MatchRecord> {
        self.lock().entries.get(index).copied()
    }

    /// Re-reads every recorded address and updates the current value in place.
    ///
    /// Addresses and original values never change; unreadable entries keep
    /// their last value. Returns how many values changed.
    pub fn refresh_values<P: ProcessMemory + ?Sized>(
        &self,
        process: &P,
        value_type: ValueType,
    ) -> usize {
        // Read outside the lock so long refreshes do not block appenders
        let targets: Vec<(Address, ValueType)> = self
            .lock()
            .entries
            .iter()
            .map(|r| {
                let ty = match value_type {
                    ValueType::Auto => r.value.value_type(),
                    ty => ty,
                };
                (r.address, ty)
            })
            .collect();

        let mut fresh = Vec::with_capacity(targets.len());
        let mut buffer = [0u8; 8];
        for (address, ty) in targets {
            let width = ty.window();
            let value = match process.read(address, &mut buffer[..width]) {
                Ok(n) if n == width => matcher::decode(&buffer[..width], 0, ty),
                _ => None,
            };
            fresh.push((address, value));
        }

        let mut inner = self.lock();
        let mut changed = 0;
        for (record, (address, value)) in inner.entries.iter_mut().zip(fresh) {
            if record.address != address {
                break;
            }
            if let Some(value) = value {
                if record.value != value {
                    record.value = value;
                    changed += 1;
                }
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::MemoryValue;

    fn record(i: usize) -> MatchRecord {
        MatchRecord::new(Address::new(0x1000 + i * 4), MemoryValue::I32(i as i32))
    }

    #[test]
    fn test_growth_doubles() {
        let store = ResultStore::new();
        assert_eq!(store.capacity(), 1024);
        for i in 0..1025 {
            store.append(record(i)).unwrap();
        }
        assert_eq!(store.len(), 1025);
        assert_eq!(store.capacity(), 2048);
    }

    #[test]
    fn test_batch_growth() {
        let store = ResultStore::with_capacity(4);
        let batch: Vec<_> = (0..9).map(record).collect();
        store.extend_batch(&batch).unwrap();
        assert_eq!(store.len(), 9);
        assert_eq!(store.capacity(), 16);
        assert_eq!(store.snapshot(), batch);
    }

    #[test]
    fn test_compact_thresholds() {
        let store = ResultStore::with_capacity(8192);
        for i in 0..100 {
            store.append(record(i)).unwrap();
        }
        assert!(store.compact());
        assert_eq!(store.capacity(), 1024);
        assert_eq!(store.len(), 100);

        // Already at the floor
        assert!(!store.compact());

        let empty = ResultStore::with_capacity(8192);
        assert!(!empty.compact());
        assert_eq!(empty.capacity(), 8192);
    }

    #[test]
    fn test_compact_keeps_double_count() {
        let store = ResultStore::with_capacity(16384);
        for i in 0..3000 {
            store.append(record(i)).unwrap();
        }
        assert!(store.compact());
        assert_eq!(store.capacity(), 6000);
        assert_eq!(store.len(), 3000);
    }

    #[test]
    fn test_clear() {
        let store = ResultStore::new();
        for i in 0..2000 {
            store.append(record(i)).unwrap();
        }
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.capacity(), INITIAL_CAPACITY);
    }
}
