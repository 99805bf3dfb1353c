//! Owned Win32 HANDLE that closes itself on drop

use crate::core::types::{MemoryError, MemoryResult};
use crate::windows::bindings::kernel32;
use tracing::debug;
use winapi::um::winnt::HANDLE;

/// Owned process handle; never null
pub struct Handle {
    handle: HANDLE,
}

impl Handle {
    /// Takes ownership of `handle`, rejecting null
    pub fn from_raw(handle: HANDLE) -> MemoryResult<Self> {
        if handle.is_null() {
            return Err(MemoryError::InvalidHandle("null process handle".to_string()));
        }
        Ok(Handle { handle })
    }

    /// Borrowed raw value, valid while `self` lives
    pub fn raw(&self) -> HANDLE {
        self.handle
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Err(e) = unsafe { kernel32::close_handle(self.handle) } {
            debug!(error = %e, "Failed to close process handle");
        }
    }
}

// HANDLE values are process-wide kernel object references, usable from any thread
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_rejected() {
        assert!(matches!(
            Handle::from_raw(std::ptr::null_mut()),
            Err(MemoryError::InvalidHandle(_))
        ));
    }
}
