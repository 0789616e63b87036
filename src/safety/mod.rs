//! Filesystem safety
//!
//! Private per-request scratch areas and symlink-safe tree removal.

pub mod safe_cleanup;
pub mod scratch;

pub use scratch::{ScratchArea, ScratchManager};
