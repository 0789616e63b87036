//! Task registry and filter resolution
//!
//! Builds the player-facing task list from declarative test metadata and
//! resolves a task name to the worker's filter expression.

pub mod catalog;
pub mod registry;
pub mod resolver;

pub use registry::{TaskAnnotation, TaskDescriptor, TaskRegistry, UNGROUPED};
pub use resolver::FilterResolver;
