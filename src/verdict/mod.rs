//! Outcome classification
//!
//! Derives a worker outcome as a pure function over run evidence.

pub mod outcome;

pub use outcome::{OutcomeClassifier, RunEvidence};
