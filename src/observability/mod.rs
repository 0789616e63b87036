//! Observability
//!
//! Structured audit events for the grading lifecycle.

pub mod audit;
