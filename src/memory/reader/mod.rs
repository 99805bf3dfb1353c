//! Reading values out of the target process

pub mod safe;

pub use safe::{ReadPolicy, SafeReader};
