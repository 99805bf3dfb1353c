//! Page protection flags

use std::fmt;

/// Page protection value in the Win32 `PAGE_*` encoding.
///
/// The low byte holds the access class; `PAGE_GUARD`, `PAGE_NOCACHE` and
/// `PAGE_WRITECOMBINE` are modifiers on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtectionFlags {
    value: u32,
}

impl ProtectionFlags {
    pub const PAGE_NOACCESS: u32 = 0x01;
    pub const PAGE_READONLY: u32 = 0x02;
    pub const PAGE_READWRITE: u32 = 0x04;
    pub const PAGE_WRITECOPY: u32 = 0x08;
    pub const PAGE_EXECUTE: u32 = 0x10;
    pub const PAGE_EXECUTE_READ: u32 = 0x20;
    pub const PAGE_EXECUTE_READWRITE: u32 = 0x40;
    pub const PAGE_EXECUTE_WRITECOPY: u32 = 0x80;
    pub const PAGE_GUARD: u32 = 0x100;
    pub const PAGE_NOCACHE: u32 = 0x200;
    pub const PAGE_WRITECOMBINE: u32 = 0x400;

    const ACCESS_MASK: u32 = 0xFF;

    pub const fn new(value: u32) -> Self {
        ProtectionFlags { value }
    }

    pub const fn no_access() -> Self {
        ProtectionFlags::new(Self::PAGE_NOACCESS)
    }

    pub const fn read_only() -> Self {
        ProtectionFlags::new(Self::PAGE_READONLY)
    }

    pub const fn read_write() -> Self {
        ProtectionFlags::new(Self::PAGE_READWRITE)
    }

    pub const fn execute_read() -> Self {
        ProtectionFlags::new(Self::PAGE_EXECUTE_READ)
    }

    pub const fn execute_read_write() -> Self {
        ProtectionFlags::new(Self::PAGE_EXECUTE_READWRITE)
    }

    /// Access class without modifier bits
    pub const fn access(&self) -> u32 {
        self.value & Self::ACCESS_MASK
    }

    /// Read access that will not fault on first touch
    pub fn is_readable(&self) -> bool {
        !self.is_guard()
            && matches!(
                self.access(),
                Self::PAGE_READONLY
                    | Self::PAGE_READWRITE
                    | Self::PAGE_WRITECOPY
                    | Self::PAGE_EXECUTE_READ
                    | Self::PAGE_EXECUTE_READWRITE
                    | Self::PAGE_EXECUTE_WRITECOPY
            )
    }

    pub fn is_writable(&self) -> bool {
        (self.value
            & (Self::PAGE_READWRITE
                | Self::PAGE_WRITECOPY
                | Self::PAGE_EXECUTE_READWRITE
                | Self::PAGE_EXECUTE_WRITECOPY))
            != 0
    }

    pub fn is_executable(&self) -> bool {
        (self.value
            & (Self::PAGE_EXECUTE
                | Self::PAGE_EXECUTE_READ
                | Self::PAGE_EXECUTE_READWRITE
                | Self::PAGE_EXECUTE_WRITECOPY))
            != 0
    }

    pub fn is_no_access(&self) -> bool {
        self.access() == Self::PAGE_NOACCESS
    }

    pub fn is_guard(&self) -> bool {
        (self.value & Self::PAGE_GUARD) != 0
    }

    /// True when every bit of `required` is already present
    pub fn contains(&self, required: ProtectionFlags) -> bool {
        (self.value & required.value) == required.value
    }

    pub fn with_guard(mut self) -> Self {
        self.value |= Self::PAGE_GUARD;
        self
    }

    pub fn without_guard(mut self) -> Self {
        self.value &= !Self::PAGE_GUARD;
        self
    }

    pub const fn raw(&self) -> u32 {
        self.value
    }
}

impl From<u32> for ProtectionFlags {
    fn from(value: u32) -> Self {
        ProtectionFlags::new(value)
    }
}

impl fmt::Display for ProtectionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = match self.access() {
            Self::PAGE_NOACCESS => "NOACCESS",
            Self::PAGE_READONLY => "R",
            Self::PAGE_READWRITE => "RW",
            Self::PAGE_WRITECOPY => "WC",
            Self::PAGE_EXECUTE => "X",
            Self::PAGE_EXECUTE_READ => "RX",
            Self::PAGE_EXECUTE_READWRITE => "RWX",
            Self::PAGE_EXECUTE_WRITECOPY => "WCX",
            0 => "NONE",
            _ => "UNKNOWN",
        };
        f.write_str(base)?;
        if self.is_guard() {
            f.write_str("+G")?;
        }
        if (self.value & Self::PAGE_NOCACHE) != 0 {
            f.write_str("+NC")?;
        }
        Ok(())
    }
}
