/// Structured audit events for the grading lifecycle
/// Every run emits start, spawn, exit or timeout, outcome and cleanup events
/// correlated by trace token and run id. Events go through `log` at a level
/// derived from their severity, and optionally to a JSON-lines audit file.
use crate::config::types::{GraderError, Result};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::SystemTime;

/// Event severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

/// Grading lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradingEventType {
    RunStart,
    WorkerSpawned,
    WorkerExited,
    WorkerTimedOut,
    ForcedKill,
    RunFailed,
    RunCompleted,
    OutputTruncated,
    CleanupSuccess,
    CleanupFailure,
    TaskNotFound,
}

impl GradingEventType {
    pub fn default_severity(&self) -> Severity {
        match self {
            GradingEventType::RunStart => Severity::Low,
            GradingEventType::WorkerSpawned => Severity::Low,
            GradingEventType::WorkerExited => Severity::Low,
            GradingEventType::RunCompleted => Severity::Low,
            GradingEventType::CleanupSuccess => Severity::Low,
            GradingEventType::TaskNotFound => Severity::Low,
            GradingEventType::OutputTruncated => Severity::Medium,
            GradingEventType::RunFailed => Severity::Medium,
            GradingEventType::WorkerTimedOut => Severity::High,
            GradingEventType::ForcedKill => Severity::High,
            GradingEventType::CleanupFailure => Severity::Critical,
        }
    }
}

/// Correlation identifiers for one grading run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    pub trace_token: String,
    pub run_id: String,
    pub worker_pid: Option<u32>,
}

impl Correlation {
    pub fn new(trace_token: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            trace_token: trace_token.into(),
            run_id: run_id.into(),
            worker_pid: None,
        }
    }

    pub fn with_worker_pid(mut self, pid: u32) -> Self {
        self.worker_pid = Some(pid);
        self
    }
}

/// One audit event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingEvent {
    pub event_type: GradingEventType,
    pub severity: Severity,
    pub timestamp: SystemTime,
    pub details: String,
    pub correlation: Option<Correlation>,
    pub filter: Option<String>,
    pub exit_code: Option<i32>,
    pub elapsed_ms: Option<u64>,
}

impl GradingEvent {
    pub fn new(event_type: GradingEventType, details: impl Into<String>) -> Self {
        Self {
            event_type,
            severity: event_type.default_severity(),
            timestamp: SystemTime::now(),
            details: details.into(),
            correlation: None,
            filter: None,
            exit_code: None,
            elapsed_ms: None,
        }
    }

    pub fn with_correlation(mut self, correlation: &Correlation) -> Self {
        self.correlation = Some(correlation.clone());
        self
    }

    pub fn with_filter(mut self, filter: &str) -> Self {
        self.filter = Some(filter.to_string());
        self
    }

    pub fn with_exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }

    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = Some(elapsed_ms);
        self
    }

    /// JSON record written to the log and the audit file
    pub fn log_entry(&self) -> serde_json::Value {
        let mut entry = serde_json::json!({
            "timestamp": self.timestamp
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            "event_type": self.event_type,
            "severity": self.severity,
            "details": self.details,
            "process_id": std::process::id(),
        });

        if let Some(correlation) = &self.correlation {
            entry["correlation"] = serde_json::json!({
                "trace_token": correlation.trace_token,
                "run_id": correlation.run_id,
                "worker_pid": correlation.worker_pid,
            });
        }
        if let Some(filter) = &self.filter {
            entry["filter"] = serde_json::json!(filter);
        }
        if let Some(code) = self.exit_code {
            entry["exit_code"] = serde_json::json!(code);
        }
        if let Some(elapsed) = self.elapsed_ms {
            entry["elapsed_ms"] = serde_json::json!(elapsed);
        }

        entry
    }
}

/// Append-only JSON-lines audit file
pub struct AuditLogger {
    audit_file: Mutex<File>,
    audit_path: PathBuf,
}

impl AuditLogger {
    pub fn new(audit_path: &Path) -> Result<Self> {
        if let Some(parent) = audit_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                GraderError::Config(format!("Failed to create audit log directory: {}", e))
            })?;
        }

        let audit_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(audit_path)
            .map_err(|e| GraderError::Config(format!("Failed to open audit log: {}", e)))?;

        Ok(Self {
            audit_file: Mutex::new(audit_file),
            audit_path: audit_path.to_path_buf(),
        })
    }

    pub fn write(&self, entry: &serde_json::Value) {
        match self.audit_file.lock() {
            Ok(mut file) => {
                if let Err(e) = writeln!(file, "{}", entry) {
                    error!("Failed to write to audit log: {}", e);
                }
            }
            Err(_) => error!("Failed to acquire lock on audit log"),
        }
    }

    pub fn audit_path(&self) -> &Path {
        &self.audit_path
    }
}

static AUDIT_LOGGER: OnceLock<AuditLogger> = OnceLock::new();

/// Route events to an audit file in addition to the log
pub fn init_audit_log(audit_path: &Path) -> Result<()> {
    let logger = AuditLogger::new(audit_path)?;
    if AUDIT_LOGGER.set(logger).is_err() {
        warn!("Audit log already initialized");
    } else {
        info!("Audit log initialized at {}", audit_path.display());
    }
    Ok(())
}

/// Emit an event
pub fn log_grading_event(event: GradingEvent) {
    let entry = event.log_entry();

    match event.severity {
        Severity::Critical | Severity::High => error!("AUDIT {}", entry),
        Severity::Medium => warn!("AUDIT {}", entry),
        Severity::Low => info!("AUDIT {}", entry),
    }

    if let Some(logger) = AUDIT_LOGGER.get() {
        logger.write(&entry);
    }
}

/// Convenience functions for the lifecycle events
pub mod events {
    use super::*;

    pub fn run_start(correlation: &Correlation, filter: &str) {
        log_grading_event(
            GradingEvent::new(GradingEventType::RunStart, "grading run started")
                .with_correlation(correlation)
                .with_filter(filter),
        );
    }

    pub fn worker_spawned(correlation: &Correlation, executable: &Path) {
        log_grading_event(
            GradingEvent::new(
                GradingEventType::WorkerSpawned,
                format!("worker {} spawned", executable.display()),
            )
            .with_correlation(correlation),
        );
    }

    pub fn worker_exited(correlation: &Correlation, exit_code: Option<i32>, elapsed_ms: u64) {
        log_grading_event(
            GradingEvent::new(GradingEventType::WorkerExited, "worker exited")
                .with_correlation(correlation)
                .with_exit_code(exit_code)
                .with_elapsed_ms(elapsed_ms),
        );
    }

    pub fn timed_out(correlation: &Correlation, budget_ms: u64) {
        log_grading_event(
            GradingEvent::new(
                GradingEventType::WorkerTimedOut,
                format!("worker exceeded wall-clock budget of {} ms", budget_ms),
            )
            .with_correlation(correlation)
            .with_elapsed_ms(budget_ms),
        );
    }

    pub fn forced_kill(correlation: &Correlation, details: String) {
        log_grading_event(
            GradingEvent::new(GradingEventType::ForcedKill, details).with_correlation(correlation),
        );
    }

    pub fn output_truncated(correlation: &Correlation, stream: &str, total_read: usize) {
        log_grading_event(
            GradingEvent::new(
                GradingEventType::OutputTruncated,
                format!("{} truncated after {} bytes read", stream, total_read),
            )
            .with_correlation(correlation),
        );
    }

    pub fn failed(correlation: &Correlation, reason: &str) {
        log_grading_event(
            GradingEvent::new(GradingEventType::RunFailed, reason).with_correlation(correlation),
        );
    }

    pub fn completed(correlation: &Correlation, report_bytes: usize) {
        log_grading_event(
            GradingEvent::new(
                GradingEventType::RunCompleted,
                format!("report collected ({} bytes)", report_bytes),
            )
            .with_correlation(correlation),
        );
    }

    pub fn task_not_found(trace_token: &str, task: &str) {
        log_grading_event(
            GradingEvent::new(GradingEventType::TaskNotFound, format!("unknown task: {}", task))
                .with_correlation(&Correlation::new(trace_token, "")),
        );
    }

    pub fn cleanup_success(correlation: &Correlation, path: &Path) {
        log_grading_event(
            GradingEvent::new(
                GradingEventType::CleanupSuccess,
                format!("scratch area {} removed", path.display()),
            )
            .with_correlation(correlation),
        );
    }

    pub fn cleanup_failure(correlation: &Correlation, path: &Path) {
        log_grading_event(
            GradingEvent::new(
                GradingEventType::CleanupFailure,
                format!("scratch area {} could not be removed", path.display()),
            )
            .with_correlation(correlation),
        );
    }
}
