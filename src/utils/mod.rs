//! Utilities
//!
//! Bounded output draining and trace token handling.

pub mod output;
pub mod trace;
