//! Memory operations for scanning, narrowing and writing process memory
//!
//! This module provides:
//! - Typed value matching and the vectorized comparator
//! - Region enumeration and data-region heuristics
//! - The multi-threaded scanner and its shared session state
//! - The result store and the narrowing engine
//! - Safe reads with retry and the protected write path

pub mod comparator;
pub mod matcher;
pub mod narrow;
pub mod reader;
pub mod regions;
pub mod results;
pub mod scanner;
pub mod writer;

pub use narrow::{NarrowCompletion, NarrowOptions, NarrowOutcome, Narrower};
pub use reader::{ReadPolicy, SafeReader};
pub use regions::{ProtectionFlags, RegionInfo, RegionState, RegionType};
pub use results::ResultStore;
pub use scanner::{MemoryScanner, Progress, ScanOptions, ScanOutcome, ScanSession, ScanState};
pub use writer::{MemoryWrite, ProtectedWriter, ProtectionContext, WriteOptions, WriteReport};
