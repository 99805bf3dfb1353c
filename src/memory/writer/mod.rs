//! Protected write path
//!
//! A write queries the target page first. Writable pages are written
//! directly; anything else needs a protection override, which is only
//! attempted when enabled. The original protection is restored on every exit
//! path, including failed writes and failed verification.

pub mod protection;

pub use protection::ProtectionContext;

use crate::config::MemoryConfig;
use crate::core::types::{Address, MemoryError, MemoryResult, MemoryValue};
use crate::memory::reader::{ReadPolicy, SafeReader};
use crate::process::ProcessMemory;
use serde::Serialize;
use tracing::{error, info, warn};

/// Common trait for memory write operations
pub trait MemoryWrite {
    /// Write raw bytes to memory
    fn write_bytes(&self, address: Address, data: &[u8]) -> MemoryResult<WriteReport>;

    /// Write a typed value to memory
    fn write_value(&self, address: Address, value: &MemoryValue) -> MemoryResult<WriteReport> {
        self.write_bytes(address, &value.to_bytes())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    pub allow_protection_override: bool,
    pub verify_writes: bool,
    pub read_policy: ReadPolicy,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            allow_protection_override: false,
            verify_writes: true,
            read_policy: ReadPolicy::default(),
        }
    }
}

impl From<&MemoryConfig> for WriteOptions {
    fn from(config: &MemoryConfig) -> Self {
        WriteOptions {
            allow_protection_override: config.overwrite_protection,
            verify_writes: config.verify_writes,
            read_policy: config.read_policy(),
        }
    }
}

/// What a successful write did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub bytes_written: usize,
    /// A temporary protection change was made and undone
    pub protection_changed: bool,
    /// Read-back confirmed the bytes. False when verification was disabled
    /// or the read-back itself failed.
    pub verified: bool,
}

/// Writer that lifts page protection only as far and as long as needed
pub struct ProtectedWriter<'a, P: ProcessMemory + ?Sized> {
    process: &'a P,
    options: WriteOptions,
}

impl<'a, P: ProcessMemory + ?Sized> ProtectedWriter<'a, P> {
    pub fn new(process: &'a P, options: WriteOptions) -> Self {
        ProtectedWriter { process, options }
    }

    fn write_and_verify(&self, address: Address, data: &[u8]) -> MemoryResult<bool> {
        let written = self.process.write(address, data).map_err(|e| {
            error!(%address, size = data.len(), error = %e, "Write failed");
            e
        })?;
        if written != data.len() {
            error!(%address, written, size = data.len(), "Partial write");
            return Err(MemoryError::write_failed(
                address,
                format!("wrote {} of {} bytes", written, data.len()),
            ));
        }

        if !self.options.verify_writes {
            return Ok(false);
        }

        let mut readback = vec![0u8; data.len()];
        let reader = SafeReader::new(self.process, self.options.read_policy);
        if let Err(e) = reader.read_exact(address, &mut readback) {
            warn!(%address, error = %e, "Could not read back written value");
            return Ok(false);
        }
        if readback != data {
            error!(
                %address,
                expected = %hex::encode(data),
                actual = %hex::encode(&readback),
                "Write verification mismatch"
            );
            return Err(MemoryError::verification_mismatch(address, data, &readback));
        }
        Ok(true)
    }
}

impl<P: ProcessMemory + ?Sized> MemoryWrite for ProtectedWriter<'_, P> {
    fn write_bytes(&self, address: Address, data: &[u8]) -> MemoryResult<WriteReport> {
        if data.is_empty() {
            return Err(MemoryError::write_failed(address, "nothing to write"));
        }

        let mut context = ProtectionContext::acquire(
            self.process,
            address,
            data.len(),
            self.options.allow_protection_override,
        )?;
        let protection_changed = context.changed();

        let outcome = self.write_and_verify(address, data);
        let restored = context.restore();

        let verified = outcome?;
        restored?;
        info!(
            %address,
            bytes = %hex::encode(data),
            protection_changed,
            verified,
            "Write succeeded"
        );
        Ok(WriteReport {
            bytes_written: data.len(),
            protection_changed,
            verified,
        })
    }
}
