/// Outcome classification for a worker run
/// A pure function over the evidence the orchestrator collected; the report
/// is only read when the evidence allows a completed outcome.
use crate::config::types::{OutputIntegrity, WorkerOutcome, REPORT_MISSING};
use crate::utils::output::CapturedStream;

/// Everything observed about one worker run
#[derive(Debug, Clone, Default)]
pub struct RunEvidence {
    /// Budget elapsed before the worker and both streams finished
    pub timed_out: bool,
    /// Worker could not be started
    pub spawn_error: Option<String>,
    /// Waiting for the worker failed, or a collector vanished
    pub wait_error: Option<String>,
    /// Logged only; the worker exits non-zero whenever a test fails
    pub exit_code: Option<i32>,
    pub stdout: CapturedStream,
    pub stderr: CapturedStream,
    pub elapsed_ms: u64,
}

pub struct OutcomeClassifier;

impl OutcomeClassifier {
    /// Derive the outcome. `read_report` is called at most once, and only when
    /// the run finished in time with a silent stderr.
    pub fn classify<F>(evidence: &RunEvidence, read_report: F) -> WorkerOutcome
    where
        F: FnOnce() -> Option<String>,
    {
        if evidence.timed_out {
            return WorkerOutcome::TimedOut;
        }

        if let Some(err) = &evidence.spawn_error {
            return WorkerOutcome::failed(format!("failed to start worker: {}", err));
        }

        if let Some(err) = &evidence.wait_error {
            return WorkerOutcome::failed(err.clone());
        }

        // Any stderr output means the worker hit an internal error
        if !evidence.stderr.is_empty() {
            return WorkerOutcome::failed(stderr_error_text(&evidence.stderr));
        }

        if evidence.stderr.integrity == OutputIntegrity::ReadError {
            return WorkerOutcome::failed("worker stderr could not be read");
        }

        match read_report() {
            Some(report_text) => WorkerOutcome::Completed { report_text },
            None => WorkerOutcome::failed(REPORT_MISSING),
        }
    }
}

/// Stderr text, with a marker when bytes past the capture limit were dropped
fn stderr_error_text(stderr: &CapturedStream) -> String {
    let mut text = stderr.text();
    if stderr.integrity == OutputIntegrity::TruncatedByLimit {
        text.push_str(&format!(
            "\n[truncated: kept {} of {} bytes]",
            stderr.bytes.len(),
            stderr.total_read
        ));
    }
    text
}
