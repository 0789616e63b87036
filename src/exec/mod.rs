//! Worker execution
//!
//! Launches the grading worker under a wall-clock budget and collects its
//! output without risking a pipe deadlock.

pub mod orchestrator;

pub use orchestrator::ProcessOrchestrator;
