/// Bounded execution of the grading worker
/// The worker runs in its own process group. Two reader threads drain its
/// output streams and a waiter thread reaps it; all three report on one
/// channel and the caller waits on that channel with a single deadline.
use crate::config::loader::WorkerSettings;
use crate::config::types::{OutputIntegrity, WorkerOutcome};
use crate::observability::audit::{events, Correlation};
use crate::safety::scratch::ScratchArea;
use crate::utils::output::{drain_stream, CapturedStream, StreamKind};
use crate::verdict::outcome::{OutcomeClassifier, RunEvidence};
use crossbeam_channel::{RecvTimeoutError, Sender};
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use std::io::Read;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Instant;

/// Messages from the monitor threads
enum RunEvent {
    Output(StreamKind, CapturedStream),
    Exited(std::io::Result<ExitStatus>),
}

/// Signal report for the timeout path
#[derive(Clone, Debug, Default)]
pub struct KillReport {
    pub kill_sent: bool,
    pub notes: Vec<String>,
}

/// Kill the worker's whole process group, falling back to the worker alone.
/// Not awaited; the waiter thread reaps the worker.
fn kill_worker_group(pid: u32) -> KillReport {
    let mut report = KillReport::default();
    let pid = Pid::from_raw(pid as i32);

    match killpg(pid, Signal::SIGKILL) {
        Ok(()) => report.kill_sent = true,
        Err(group_err) => {
            report
                .notes
                .push(format!("group SIGKILL failed: {}", group_err));
            match kill(pid, Signal::SIGKILL) {
                Ok(()) => {
                    report.kill_sent = true;
                    report.notes.push("direct SIGKILL fallback used".to_string());
                }
                Err(e) => report.notes.push(format!("direct SIGKILL failed: {}", e)),
            }
        }
    }

    report
}

fn spawn_reader<R>(kind: StreamKind, stream: R, limit: usize, tx: Sender<RunEvent>) -> std::io::Result<()>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("gradebox-{}", kind.as_str()))
        .spawn(move || {
            let captured = drain_stream(stream, limit);
            let _ = tx.send(RunEvent::Output(kind, captured));
        })
        .map(|_| ())
}

fn spawn_waiter(mut child: Child, tx: Sender<RunEvent>) -> std::io::Result<()> {
    thread::Builder::new()
        .name("gradebox-waiter".to_string())
        .spawn(move || {
            let status = child.wait();
            let _ = tx.send(RunEvent::Exited(status));
        })
        .map(|_| ())
}

fn read_report(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) => {
            log::debug!("Report {} not readable: {}", path.display(), e);
            None
        }
    }
}

/// Runs the grading worker against a scratch area
#[derive(Clone, Debug)]
pub struct ProcessOrchestrator {
    settings: WorkerSettings,
}

impl ProcessOrchestrator {
    pub fn new(settings: WorkerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    /// Run the worker once and classify the result. Never blocks longer than
    /// the configured budget.
    pub fn run(
        &self,
        area: &ScratchArea,
        correlation: &Correlation,
        filter: &str,
    ) -> WorkerOutcome {
        let evidence = self.execute(area, correlation, filter);

        let report_path = area.path().join(&self.settings.report_file_name);
        let outcome = OutcomeClassifier::classify(&evidence, || read_report(&report_path));

        match &outcome {
            WorkerOutcome::Completed { report_text } => {
                events::completed(correlation, report_text.len())
            }
            WorkerOutcome::Failed { error_text } => events::failed(correlation, error_text),
            WorkerOutcome::TimedOut => {}
        }

        outcome
    }

    fn command(&self, area: &ScratchArea, trace_token: &str, filter: &str) -> Command {
        let mut command = Command::new(&self.settings.executable);
        command
            .args(&self.settings.args)
            .arg(area.credentials_file_path())
            .arg(area.path())
            .arg(trace_token)
            .arg(filter)
            .current_dir(&self.settings.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);
        command
    }

    fn execute(&self, area: &ScratchArea, correlation: &Correlation, filter: &str) -> RunEvidence {
        let started = Instant::now();
        let deadline = started + self.settings.timeout();
        let mut evidence = RunEvidence::default();

        let mut child = match self
            .command(area, &correlation.trace_token, filter)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                log::error!(
                    "Failed to spawn worker {}: {}",
                    self.settings.executable.display(),
                    e
                );
                evidence.spawn_error = Some(e.to_string());
                return evidence;
            }
        };

        let pid = child.id();
        let correlation = correlation.clone().with_worker_pid(pid);
        events::worker_spawned(&correlation, &self.settings.executable);

        let (tx, rx) = crossbeam_channel::unbounded();
        let mut pending = 0usize;
        let mut setup_error = None;

        if let Some(stdout) = child.stdout.take() {
            match spawn_reader(StreamKind::Stdout, stdout, self.settings.stdout_limit, tx.clone()) {
                Ok(()) => pending += 1,
                Err(e) => setup_error = Some(format!("failed to start stdout reader: {}", e)),
            }
        }
        if let Some(stderr) = child.stderr.take() {
            match spawn_reader(StreamKind::Stderr, stderr, self.settings.stderr_limit, tx.clone()) {
                Ok(()) => pending += 1,
                Err(e) => setup_error = Some(format!("failed to start stderr reader: {}", e)),
            }
        }
        match spawn_waiter(child, tx) {
            Ok(()) => pending += 1,
            Err(e) => setup_error = Some(format!("failed to start waiter: {}", e)),
        }

        if let Some(err) = setup_error {
            log::error!("{}", err);
            kill_worker_group(pid);
            evidence.wait_error = Some(err);
            return evidence;
        }

        while pending > 0 {
            match rx.recv_deadline(deadline) {
                Ok(event) => {
                    pending -= 1;
                    match event {
                        RunEvent::Output(StreamKind::Stdout, captured) => evidence.stdout = captured,
                        RunEvent::Output(StreamKind::Stderr, captured) => evidence.stderr = captured,
                        RunEvent::Exited(Ok(status)) => {
                            evidence.exit_code = status.code();
                            if let Some(signal) = status.signal() {
                                log::warn!("Worker {} terminated by signal {}", pid, signal);
                            }
                            events::worker_exited(
                                &correlation,
                                evidence.exit_code,
                                started.elapsed().as_millis() as u64,
                            );
                        }
                        RunEvent::Exited(Err(e)) => {
                            evidence.wait_error = Some(format!("failed to wait for worker: {}", e));
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    evidence.timed_out = true;
                    events::timed_out(&correlation, self.settings.timeout_ms);
                    let report = kill_worker_group(pid);
                    events::forced_kill(
                        &correlation,
                        format!(
                            "SIGKILL sent to worker group (sent={}, notes={:?})",
                            report.kill_sent, report.notes
                        ),
                    );
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    kill_worker_group(pid);
                    evidence.wait_error =
                        Some("worker monitor threads exited without reporting".to_string());
                    break;
                }
            }
        }

        for (kind, captured) in [
            (StreamKind::Stdout, &evidence.stdout),
            (StreamKind::Stderr, &evidence.stderr),
        ] {
            if captured.integrity == OutputIntegrity::TruncatedByLimit {
                events::output_truncated(&correlation, kind.as_str(), captured.total_read);
            }
        }

        evidence.elapsed_ms = started.elapsed().as_millis() as u64;
        evidence
    }
}
