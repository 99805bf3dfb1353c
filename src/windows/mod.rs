//! Windows API layer
//!
//! All unsafe FFI calls live under [`bindings`]. Error codes are compiled on
//! every platform so other backends can speak the same vocabulary.

#[cfg(windows)]
pub mod bindings;
#[cfg(windows)]
pub mod types;
pub mod utils;

#[cfg(windows)]
pub use bindings::kernel32;
#[cfg(windows)]
pub use types::Handle;
pub use utils::ErrorCode;
