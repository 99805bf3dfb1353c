//! Scoped page-protection change around a single write

use crate::core::types::{Address, MemoryError, MemoryResult};
use crate::logging::SECURITY_TARGET;
use crate::memory::regions::ProtectionFlags;
use crate::process::ProcessMemory;
use crate::windows::utils::error_codes::ERROR_INVALID_PARAMETER;
use tracing::{error, info, warn};

/// Captures a page's protection, lifts it for writing if needed and puts it
/// back. Restoration is attempted exactly once: explicitly through
/// [`ProtectionContext::restore`] or, failing that, on drop.
pub struct ProtectionContext<'a, P: ProcessMemory + ?Sized> {
    process: &'a P,
    address: Address,
    size: usize,
    original: ProtectionFlags,
    changed: bool,
    restored: bool,
}

impl<'a, P: ProcessMemory + ?Sized> ProtectionContext<'a, P> {
    /// Queries the page at `address` and makes it writable when it is not.
    ///
    /// Fails with [`MemoryError::ProtectionOverrideDisabled`] when a change is
    /// needed but `allow_override` is false.
    pub fn acquire(
        process: &'a P,
        address: Address,
        size: usize,
        allow_override: bool,
    ) -> MemoryResult<Self> {
        let region = process
            .query_region(address)?
            .ok_or_else(|| MemoryError::InvalidAddress(address.to_string()))?;
        if !region.is_committed() {
            return Err(MemoryError::ProtectionError(format!(
                "{} is not committed memory",
                address
            )));
        }

        let mut context = ProtectionContext {
            process,
            address,
            size,
            original: region.protection,
            changed: false,
            restored: false,
        };

        if Self::is_sufficient(region.protection) {
            return Ok(context);
        }

        if !allow_override {
            warn!(
                target: SECURITY_TARGET,
                %address,
                protection = %region.protection,
                "Write needs a protection change but overrides are disabled"
            );
            return Err(MemoryError::ProtectionOverrideDisabled {
                address: address.to_string(),
                protection: region.protection.to_string(),
            });
        }

        context.change()?;
        Ok(context)
    }

    fn is_sufficient(protection: ProtectionFlags) -> bool {
        protection.is_writable() && !protection.is_guard()
    }

    fn change(&mut self) -> MemoryResult<()> {
        let desired = if self.original.is_guard() {
            ProtectionFlags::read_write().with_guard()
        } else {
            ProtectionFlags::read_write()
        };

        let applied = match self.process.protect(self.address, self.size, desired) {
            Ok(_) => desired,
            Err(MemoryError::AccessDenied { code, .. }) if code == ERROR_INVALID_PARAMETER => {
                // The combined value was refused; plain read-write is the fallback
                let fallback = ProtectionFlags::read_write();
                warn!(
                    target: SECURITY_TARGET,
                    address = %self.address,
                    rejected = %desired,
                    "Protection rejected, retrying with {}",
                    fallback
                );
                self.process
                    .protect(self.address, self.size, fallback)
                    .map_err(|e| self.change_failed(e))?;
                fallback
            }
            Err(e) => return Err(self.change_failed(e)),
        };

        self.changed = true;
        info!(
            target: SECURITY_TARGET,
            address = %self.address,
            size = self.size,
            from = %self.original,
            to = %applied,
            "Memory protection changed"
        );
        Ok(())
    }

    fn change_failed(&self, cause: MemoryError) -> MemoryError {
        error!(
            target: SECURITY_TARGET,
            address = %self.address,
            protection = %self.original,
            error = %cause,
            "Failed to change memory protection"
        );
        MemoryError::ProtectionError(format!(
            "changing protection at {} from {}: {}",
            self.address, self.original, cause
        ))
    }

    /// Protection found when the context was acquired
    pub fn original(&self) -> ProtectionFlags {
        self.original
    }

    /// Whether a protection change is currently in effect
    pub fn changed(&self) -> bool {
        self.changed && !self.restored
    }

    /// Puts the original protection back. A no-op when nothing was changed or
    /// restoration already ran.
    pub fn restore(&mut self) -> MemoryResult<()> {
        if !self.changed || self.restored {
            return Ok(());
        }
        self.restored = true;

        match self.process.protect(self.address, self.size, self.original) {
            Ok(_) => {
                info!(
                    target: SECURITY_TARGET,
                    address = %self.address,
                    protection = %self.original,
                    "Memory protection restored"
                );
                Ok(())
            }
            Err(e) => {
                error!(
                    target: SECURITY_TARGET,
                    critical = true,
                    address = %self.address,
                    protection = %self.original,
                    error = %e,
                    "Failed to restore memory protection"
                );
                Err(MemoryError::ProtectionError(format!(
                    "restoring {} at {}: {}",
                    self.original, self.address, e
                )))
            }
        }
    }
}

impl<P: ProcessMemory + ?Sized> Drop for ProtectionContext<'_, P> {
    fn drop(&mut self) {
        // Logged inside restore
        let _ = self.restore();
    }
}
