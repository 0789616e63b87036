//! gradebox: bounded, isolated execution of an automated cloud grading battery
//! Runs an external grading worker against a student's cloud environment and
//! returns machine-readable pass/fail results without letting a slow or hung
//! run block the caller.
//!
//! # Architecture
//!
//! ## Tasks ([`tasks`])
//! - [`tasks::registry`]: Task descriptors built from declarative test metadata
//! - [`tasks::catalog`]: Built-in annotation table of the Azure project battery
//! - [`tasks::resolver`]: Task name to worker filter expression
//!
//! ## Safety ([`safety`])
//! - [`safety::scratch`]: Per-request scratch areas holding the credential file
//! - [`safety::safe_cleanup`]: Symlink-safe, single-filesystem tree removal
//!
//! ## Execution ([`exec`])
//! - [`exec::orchestrator`]: Worker launch, fan-in wait and timeout kill
//!
//! ## Outcome & Report ([`verdict`], [`report`])
//! - [`verdict::outcome`]: Outcome as a pure function over run evidence
//! - [`report::parser`]: NUnit report to pass/fail map
//!
//! ## Rephrasing ([`rephrase`])
//! - [`rephrase::cache`]: Time-bounded memoization keyed by sentence and variant
//! - [`rephrase::client`]: Azure OpenAI chat-completions collaborator
//!
//! ## Observability ([`observability`])
//! - [`observability::audit`]: Structured grading lifecycle events
//!
//! ## Configuration ([`config`])
//! - [`config::loader`]: gradebox.json plus environment overrides
//! - [`config::validator`]: Startup validation
//! - [`config::types`]: Shared types and the error taxonomy
//!
//! ## Utilities ([`utils`])
//! - [`utils::output`]: Bounded output draining
//! - [`utils::trace`]: Trace token extraction and hashing
//!
//! The front door is [`service::GradingService`]; [`cli`] wraps it for the
//! `gradebox` binary.

// Task registry and filter resolution
pub mod tasks;

// Scratch areas and cleanup
pub mod safety;

// Worker execution
pub mod exec;

// Outcome classification
pub mod verdict;

// Report extraction
pub mod report;

// Instruction rephrasing
pub mod rephrase;

// Observability
pub mod observability;

// Configuration
pub mod config;

// Utilities
pub mod utils;

// Service facade
pub mod service;

// CLI entrypoint wiring for the gradebox binary
pub mod cli;

// Re-export commonly used types for convenience
pub use config::types::*;
pub use service::{GradingResult, GradingService};
