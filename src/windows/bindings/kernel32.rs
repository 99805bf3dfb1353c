//! Kernel32.dll bindings for process and memory operations

use crate::core::types::{MemoryError, MemoryResult};
use crate::windows::utils::error_codes::{ErrorCode, ERROR_INVALID_PARAMETER};
use std::mem;
use winapi::shared::minwindef::{DWORD, FALSE, LPVOID};
use winapi::um::handleapi::CloseHandle;
use winapi::um::memoryapi::{ReadProcessMemory, VirtualProtectEx, VirtualQueryEx, WriteProcessMemory};
use winapi::um::processthreadsapi::OpenProcess;
use winapi::um::sysinfoapi::{GetSystemInfo, SYSTEM_INFO};
use winapi::um::winnt::{HANDLE, MEMORY_BASIC_INFORMATION};

/// Safe wrapper for OpenProcess
pub fn open_process(pid: u32, desired_access: u32) -> MemoryResult<HANDLE> {
    unsafe {
        let handle = OpenProcess(desired_access, FALSE, pid);
        if handle.is_null() {
            let code = ErrorCode::last_error();
            Err(MemoryError::ProcessNotFound(format!("PID {}: {}", pid, code)))
        } else {
            Ok(handle)
        }
    }
}

/// Safe wrapper for CloseHandle
///
/// # Safety
/// The handle must be a valid Windows handle
pub unsafe fn close_handle(handle: HANDLE) -> MemoryResult<()> {
    if handle.is_null() {
        return Ok(());
    }

    if CloseHandle(handle) == FALSE {
        Err(MemoryError::WindowsApi(format!(
            "CloseHandle failed: {}",
            ErrorCode::last_error()
        )))
    } else {
        Ok(())
    }
}

/// Safe wrapper for ReadProcessMemory.
///
/// A failed call that still copied bytes is reported as a partial read.
///
/// # Safety
/// The handle must be a valid process handle with `PROCESS_VM_READ`
pub unsafe fn read_process_memory(
    handle: HANDLE,
    address: usize,
    buffer: &mut [u8],
) -> MemoryResult<usize> {
    let mut bytes_read = 0;

    let result = ReadProcessMemory(
        handle,
        address as LPVOID,
        buffer.as_mut_ptr() as LPVOID,
        buffer.len(),
        &mut bytes_read,
    );

    if result == FALSE && bytes_read == 0 {
        Err(ErrorCode::last_error().to_access_error(format!("0x{:X}", address)))
    } else {
        Ok(bytes_read)
    }
}

/// Safe wrapper for WriteProcessMemory
///
/// # Safety
/// The handle must be a valid process handle with `PROCESS_VM_WRITE`
pub unsafe fn write_process_memory(
    handle: HANDLE,
    address: usize,
    data: &[u8],
) -> MemoryResult<usize> {
    let mut bytes_written = 0;

    let result = WriteProcessMemory(
        handle,
        address as LPVOID,
        data.as_ptr() as LPVOID,
        data.len(),
        &mut bytes_written,
    );

    if result == FALSE {
        Err(ErrorCode::last_error().to_access_error(format!("0x{:X}", address)))
    } else {
        Ok(bytes_written)
    }
}

/// Safe wrapper for VirtualQueryEx.
///
/// Returns `Ok(None)` when the address lies past the end of the user address
/// space.
///
/// # Safety
/// The handle must be a valid process handle with `PROCESS_QUERY_INFORMATION`
pub unsafe fn virtual_query_ex(
    handle: HANDLE,
    address: usize,
) -> MemoryResult<Option<MEMORY_BASIC_INFORMATION>> {
    let mut mbi: MEMORY_BASIC_INFORMATION = mem::zeroed();

    let result = VirtualQueryEx(
        handle,
        address as LPVOID,
        &mut mbi,
        mem::size_of::<MEMORY_BASIC_INFORMATION>(),
    );

    if result != 0 {
        return Ok(Some(mbi));
    }

    match ErrorCode::last_error_raw() {
        ERROR_INVALID_PARAMETER => Ok(None),
        code => Err(ErrorCode::from(code).to_access_error(format!("0x{:X}", address))),
    }
}

/// Safe wrapper for VirtualProtectEx, returning the previous protection
///
/// # Safety
/// The handle must be a valid process handle with `PROCESS_VM_OPERATION`
pub unsafe fn virtual_protect_ex(
    handle: HANDLE,
    address: usize,
    size: usize,
    protection: u32,
) -> MemoryResult<u32> {
    let mut old_protection: DWORD = 0;

    let result = VirtualProtectEx(
        handle,
        address as LPVOID,
        size,
        protection,
        &mut old_protection,
    );

    if result == FALSE {
        Err(ErrorCode::last_error().to_access_error(format!("0x{:X}", address)))
    } else {
        Ok(old_protection)
    }
}

/// Minimum and maximum application addresses from GetSystemInfo
pub fn application_address_range() -> (usize, usize) {
    unsafe {
        let mut info: SYSTEM_INFO = mem::zeroed();
        GetSystemInfo(&mut info);
        (
            info.lpMinimumApplicationAddress as usize,
            info.lpMaximumApplicationAddress as usize,
        )
    }
}
