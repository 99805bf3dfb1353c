//! Validated reads with retry and partial-read continuation

use crate::core::types::{Address, MemoryError, MemoryResult, MemoryValue, ValueType};
use crate::memory::regions::RegionInfo;
use crate::process::ProcessMemory;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// How hard a read tries before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for ReadPolicy {
    fn default() -> Self {
        ReadPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(5),
        }
    }
}

/// Reader that checks the region before touching it and retries transient
/// failures
pub struct SafeReader<'a, P: ProcessMemory + ?Sized> {
    process: &'a P,
    policy: ReadPolicy,
}

impl<'a, P: ProcessMemory + ?Sized> SafeReader<'a, P> {
    pub fn new(process: &'a P, policy: ReadPolicy) -> Self {
        SafeReader { process, policy }
    }

    /// Fails unless `address` lies in committed, readable memory
    pub fn validate_region(&self, address: Address) -> MemoryResult<RegionInfo> {
        let region = self
            .process
            .query_region(address)?
            .ok_or_else(|| MemoryError::InvalidAddress(address.to_string()))?;

        if !region.is_readable() {
            debug!(
                %address,
                state = ?region.state,
                protection = %region.protection,
                "Memory is not readable"
            );
            return Err(MemoryError::read_failed(
                address,
                format!("region not readable ({:?}, {})", region.state, region.protection),
            ));
        }
        Ok(region)
    }

    /// Fills `buffer` from `address`, continuing partial reads and retrying
    /// failed attempts with a fixed backoff.
    pub fn read_exact(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<()> {
        self.validate_region(address)?;

        let attempts = self.policy.max_attempts.max(1);
        let mut filled = 0usize;
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                debug!(%address, attempt, filled, "Retrying read");
                thread::sleep(self.policy.backoff);
            }

            match self.process.read(address.add(filled), &mut buffer[filled..]) {
                Ok(count) => {
                    filled += count;
                    if filled == buffer.len() {
                        return Ok(());
                    }
                    if count > 0 {
                        debug!(%address, filled, wanted = buffer.len(), "Partial read");
                    }
                }
                Err(e) => last_error = Some(e),
            }
        }

        debug!(%address, attempts, filled, "Read failed after retries");
        Err(MemoryError::read_failed(
            address,
            match last_error {
                Some(e) => format!("read {} of {} bytes: {}", filled, buffer.len(), e),
                None => format!("read {} of {} bytes", filled, buffer.len()),
            },
        ))
    }

    /// Reads and decodes one value of a concrete type
    pub fn read_value(&self, address: Address, value_type: ValueType) -> MemoryResult<MemoryValue> {
        let size = value_type
            .size()
            .ok_or_else(|| MemoryError::InvalidValueType(value_type.to_string()))?;
        let mut buffer = [0u8; 8];
        self.read_exact(address, &mut buffer[..size])?;
        MemoryValue::from_bytes(&buffer[..size], value_type)
            .ok_or_else(|| MemoryError::InvalidValueType(value_type.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::regions::ProtectionFlags;
    use crate::process::SimulatedProcess;

    fn policy() -> ReadPolicy {
        ReadPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_read_value() {
        let process = SimulatedProcess::new(1);
        process.add_region(Address::new(0x10000), 0x1000, ProtectionFlags::read_only());
        process.poke(Address::new(0x10010), &42i32.to_le_bytes()).unwrap();

        let reader = SafeReader::new(&process, policy());
        assert_eq!(
            reader.read_value(Address::new(0x10010), ValueType::Int32).unwrap(),
            MemoryValue::I32(42)
        );
        assert!(reader.read_value(Address::new(0x10010), ValueType::Auto).is_err());
    }

    #[test]
    fn test_rejects_unreadable() {
        let process = SimulatedProcess::new(1);
        process.add_region(Address::new(0x10000), 0x1000, ProtectionFlags::no_access());
        let reader = SafeReader::new(&process, policy());
        let mut buf = [0u8; 4];
        assert!(reader.read_exact(Address::new(0x10000), &mut buf).is_err());
        assert_eq!(process.read_calls(), 0);
    }

    #[test]
    fn test_short_region_fails_after_retries() {
        let process = SimulatedProcess::new(1);
        process.add_region(Address::new(0x10000), 0x1000, ProtectionFlags::read_write());
        let reader = SafeReader::new(&process, policy());
        let mut buf = [0u8; 8];
        let err = reader.read_exact(Address::new(0x10FFC), &mut buf).unwrap_err();
        assert!(matches!(err, MemoryError::ReadFailed { .. }));
        assert_eq!(process.read_calls(), 3);
    }
}
