//! Report extraction
//!
//! Turns the worker's XML report into a pass/fail map.

pub mod parser;

pub use parser::parse_report;
