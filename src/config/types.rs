/// Shared types for the grading engine
/// Error taxonomy, run outcomes, result maps and stream integrity markers.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Trace token used when the caller supplies none
pub const NO_TRACE: &str = "NoTrace";

/// Error text reported when the worker finished cleanly but left no report
pub const REPORT_MISSING: &str = "report missing";

/// Pass/fail per fully-qualified test name
pub type ResultMap = BTreeMap<String, bool>;

/// One inbound grading call. Never persisted.
#[derive(Clone, Debug, Default)]
pub struct GradingRequest {
    /// Opaque credential blob, written verbatim into the scratch area
    pub credentials: Vec<u8>,
    /// Caller-supplied correlation token
    pub trace_token: Option<String>,
    /// Task name to run; `None` or empty runs the whole battery
    pub task: Option<String>,
}

impl GradingRequest {
    pub fn new(credentials: impl Into<Vec<u8>>) -> Self {
        Self {
            credentials: credentials.into(),
            trace_token: None,
            task: None,
        }
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace_token = Some(trace.into());
        self
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }
}

/// Result of one orchestrated worker run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerOutcome {
    /// Worker finished within budget, stayed silent on stderr and wrote a report
    Completed {
        #[serde(rename = "reportText")]
        report_text: String,
    },
    /// Wall-clock budget elapsed before the worker and both streams finished
    TimedOut,
    /// Worker signalled an internal error, could not be started, or left no report
    Failed {
        #[serde(rename = "errorText")]
        error_text: String,
    },
}

impl WorkerOutcome {
    pub fn failed(error_text: impl Into<String>) -> Self {
        WorkerOutcome::Failed {
            error_text: error_text.into(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, WorkerOutcome::Completed { .. })
    }

    /// Short status label used in logs and CLI output
    pub fn status(&self) -> &'static str {
        match self {
            WorkerOutcome::Completed { .. } => "completed",
            WorkerOutcome::TimedOut => "timed_out",
            WorkerOutcome::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for WorkerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerOutcome::Completed { report_text } => {
                write!(f, "completed ({} bytes of report)", report_text.len())
            }
            WorkerOutcome::TimedOut => write!(f, "timed out"),
            WorkerOutcome::Failed { error_text } => write!(f, "failed: {}", error_text),
        }
    }
}

/// Capture state of one worker output stream
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputIntegrity {
    /// Stream read to EOF and fully retained
    #[default]
    Complete,
    /// Stream read to EOF but bytes past the capture limit were discarded
    TruncatedByLimit,
    /// Read failed before EOF
    ReadError,
}

impl fmt::Display for OutputIntegrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputIntegrity::Complete => write!(f, "complete"),
            OutputIntegrity::TruncatedByLimit => write!(f, "truncated_by_limit"),
            OutputIntegrity::ReadError => write!(f, "read_error"),
        }
    }
}

/// Grading engine errors
#[derive(Error, Debug)]
pub enum GraderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Malformed report: {0}")]
    MalformedReport(String),

    #[error("Filesystem error: {0}")]
    Filesystem(String),

    #[error("Rephrase error: {0}")]
    Rephrase(String),
}

pub type Result<T> = std::result::Result<T, GraderError>;
