/// Maps a human-facing task name to the filter expression the worker runs
use crate::config::types::{GraderError, Result};
use crate::tasks::registry::TaskRegistry;
use std::sync::Arc;

pub struct FilterResolver {
    registry: Arc<TaskRegistry>,
    default_filter: String,
}

impl FilterResolver {
    pub fn new(registry: Arc<TaskRegistry>, default_filter: impl Into<String>) -> Self {
        Self {
            registry,
            default_filter: default_filter.into(),
        }
    }

    /// Empty or absent identifier yields the default filter. Any other name
    /// must match a task exactly; an unknown name is an error and no run
    /// should be attempted.
    pub fn resolve(&self, identifier: Option<&str>) -> Result<String> {
        let name = match identifier {
            None | Some("") => return Ok(self.default_filter.clone()),
            Some(name) => name,
        };

        self.registry
            .lookup(name)
            .map(|task| task.filter_expression.clone())
            .ok_or_else(|| GraderError::TaskNotFound(name.to_string()))
    }

    pub fn default_filter(&self) -> &str {
        &self.default_filter
    }
}
