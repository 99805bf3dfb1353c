//! Win32 error codes the memory pipeline reacts to
//!
//! The constants are plain numbers so non-Windows backends can report
//! failures in the same vocabulary.

use crate::core::types::MemoryError;
use std::fmt;

pub const ERROR_SUCCESS: u32 = 0;
pub const ERROR_ACCESS_DENIED: u32 = 5;
pub const ERROR_INVALID_HANDLE: u32 = 6;
pub const ERROR_INVALID_PARAMETER: u32 = 87;
pub const ERROR_PARTIAL_COPY: u32 = 299;
pub const ERROR_INVALID_ADDRESS: u32 = 487;
pub const ERROR_NOACCESS: u32 = 998;

/// Common Windows error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success,
    AccessDenied,
    InvalidHandle,
    InvalidParameter,
    PartialCopy,
    InvalidAddress,
    NoAccess,
    Unknown(u32),
}

impl From<u32> for ErrorCode {
    fn from(code: u32) -> Self {
        match code {
            ERROR_SUCCESS => ErrorCode::Success,
            ERROR_ACCESS_DENIED => ErrorCode::AccessDenied,
            ERROR_INVALID_HANDLE => ErrorCode::InvalidHandle,
            ERROR_INVALID_PARAMETER => ErrorCode::InvalidParameter,
            ERROR_PARTIAL_COPY => ErrorCode::PartialCopy,
            ERROR_INVALID_ADDRESS => ErrorCode::InvalidAddress,
            ERROR_NOACCESS => ErrorCode::NoAccess,
            other => ErrorCode::Unknown(other),
        }
    }
}

impl ErrorCode {
    /// Calling thread's last Win32 error
    #[cfg(windows)]
    pub fn last_error() -> Self {
        ErrorCode::from(Self::last_error_raw())
    }

    #[cfg(windows)]
    pub fn last_error_raw() -> u32 {
        unsafe { winapi::um::errhandlingapi::GetLastError() }
    }

    pub fn code(&self) -> u32 {
        match self {
            ErrorCode::Success => ERROR_SUCCESS,
            ErrorCode::AccessDenied => ERROR_ACCESS_DENIED,
            ErrorCode::InvalidHandle => ERROR_INVALID_HANDLE,
            ErrorCode::InvalidParameter => ERROR_INVALID_PARAMETER,
            ErrorCode::PartialCopy => ERROR_PARTIAL_COPY,
            ErrorCode::InvalidAddress => ERROR_INVALID_ADDRESS,
            ErrorCode::NoAccess => ERROR_NOACCESS,
            ErrorCode::Unknown(code) => *code,
        }
    }

    /// Access-denied error for `address` carrying this code and its text
    pub fn to_access_error(self, address: impl fmt::Display) -> MemoryError {
        MemoryError::access_denied(address, self.code(), self.to_string())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Success => write!(f, "Success"),
            ErrorCode::AccessDenied => write!(f, "Access denied"),
            ErrorCode::InvalidHandle => write!(f, "Invalid handle"),
            ErrorCode::InvalidParameter => write!(f, "Invalid parameter"),
            ErrorCode::PartialCopy => write!(f, "Partial copy"),
            ErrorCode::InvalidAddress => write!(f, "Invalid address"),
            ErrorCode::NoAccess => write!(f, "Invalid access to memory location"),
            ErrorCode::Unknown(code) => write!(f, "Unknown error: {}", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_conversion() {
        assert_eq!(ErrorCode::from(0), ErrorCode::Success);
        assert_eq!(ErrorCode::from(87), ErrorCode::InvalidParameter);
        assert_eq!(ErrorCode::from(12345), ErrorCode::Unknown(12345));
        assert_eq!(ErrorCode::PartialCopy.code(), ERROR_PARTIAL_COPY);
    }

    #[test]
    fn test_to_access_error() {
        let err = ErrorCode::AccessDenied.to_access_error("0x1000");
        assert_eq!(
            err.to_string(),
            "Access denied at 0x1000 (OS error 5): Access denied"
        );
    }
}
