//! Integration tests for the grading pipeline
//!
//! Each test drives a real `/bin/sh` worker script through the service and
//! checks the outcome, the parsed results and scratch cleanup.

use gradebox::config::loader::GraderConfig;
use gradebox::{GraderError, GradingRequest, GradingService, WorkerOutcome};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const REPORT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<test-run id="0" result="Failed">
  <test-suite type="Assembly" name="AzureProjectTest.dll">
    <test-suite type="TestSuite" name="AzureProjectTest">
      <test-suite type="TestFixture" name="StorageAccountTest">
        <test-case fullname="AzureProjectTest.StorageAccountTest.Test01_StorageAccountsWithTag" result="Passed"/>
        <test-case fullname="AzureProjectTest.StorageAccountTest.Test02_StorageAccountsWithTag" result="Failed"/>
        <test-case fullname="AzureProjectTest.StorageAccountTest.Test03_StorageAccountSettings" result="Skipped"/>
      </test-suite>
    </test-suite>
  </test-suite>
</test-run>"#;

struct Harness {
    dir: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn scratch_dir(&self) -> PathBuf {
        self.dir.path().join("scratch")
    }

    fn service(&self, script_body: &str, timeout_ms: u64) -> GradingService {
        let script = self.dir.path().join("worker.sh");
        std::fs::write(&script, format!("{}\n", script_body)).unwrap();

        let mut config = GraderConfig::default();
        config.worker.executable = PathBuf::from("/bin/sh");
        config.worker.args = vec![script.display().to_string()];
        config.worker.working_dir = self.dir.path().to_path_buf();
        config.worker.timeout_ms = timeout_ms;
        config.scratch.base_dir = self.scratch_dir();
        GradingService::new(config).unwrap()
    }

    fn leftover_areas(&self) -> usize {
        match std::fs::read_dir(self.scratch_dir()) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

fn write_report_script(report: &str, report_copy: &Path) -> String {
    std::fs::write(report_copy, report).unwrap();
    format!("cat '{}' > \"$2/TestResult.xml\"", report_copy.display())
}

#[test]
fn test_completed_run_is_parsed_and_cleaned() {
    let harness = Harness::new();
    let body = write_report_script(REPORT, &harness.dir.path().join("report.xml"));
    let service = harness.service(&body, 10_000);

    let request = GradingRequest::new(br#"{"clientId":"x"}"#.to_vec()).with_trace("student@school.edu");
    let result = service.grade(&request).unwrap();

    assert!(result.outcome.is_completed());
    let results = result.results.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results["AzureProjectTest.StorageAccountTest.Test01_StorageAccountsWithTag"]);
    assert!(!results["AzureProjectTest.StorageAccountTest.Test02_StorageAccountsWithTag"]);
    assert!(!results["AzureProjectTest.StorageAccountTest.Test03_StorageAccountSettings"]);
    assert_eq!(harness.leftover_areas(), 0);
}

#[test]
fn test_worker_sees_credentials_and_filter() {
    let harness = Harness::new();
    let service = harness.service(
        r#"test "$(cat "$1")" = 'secret-blob' || echo "bad credentials" >&2
test "$4" = 'test=AzureProjectTest.StorageAccountTest.Test05_StorageAccountCodeContainer' || echo "bad filter: $4" >&2
test "$3" = 'a@b.io' || echo "bad trace: $3" >&2
echo '<test-run/>' > "$2/TestResult.xml""#,
        10_000,
    );

    let request = GradingRequest::new(b"secret-blob".to_vec())
        .with_trace("graded by a@b.io")
        .with_task("AzureProjectTest.StorageAccountTest.Test05_StorageAccountCodeContainer");
    let outcome = service.run_grading(&request).unwrap();

    assert_eq!(
        outcome,
        WorkerOutcome::Completed {
            report_text: "<test-run/>\n".to_string()
        }
    );
}

#[test]
fn test_nonzero_exit_with_report_still_completes() {
    let harness = Harness::new();
    let service = harness.service(
        "echo '<test-run/>' > \"$2/TestResult.xml\"\necho '1 test failed'\nexit 1",
        10_000,
    );

    let outcome = service
        .run_grading(&GradingRequest::new(b"{}".to_vec()))
        .unwrap();
    assert!(outcome.is_completed());
}

#[test]
fn test_timeout_returns_within_budget_and_cleans_up() {
    let harness = Harness::new();
    let service = harness.service("sleep 30", 1_000);

    let started = Instant::now();
    let outcome = service
        .run_grading(&GradingRequest::new(b"{}".to_vec()))
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(outcome, WorkerOutcome::TimedOut);
    assert!(elapsed >= Duration::from_millis(1_000));
    assert!(elapsed < Duration::from_secs(4), "took {:?}", elapsed);
    assert_eq!(harness.leftover_areas(), 0);
}

/// Scheduler state of a live or unreaped process, `None` once it is gone
fn process_state(pid: u32) -> Option<char> {
    let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    let after_comm = &stat[stat.rfind(')')? + 1..];
    after_comm.trim_start().chars().next()
}

fn is_dead(pid: u32) -> bool {
    matches!(process_state(pid), None | Some('Z'))
}

#[test]
fn test_timeout_kills_background_children() {
    let harness = Harness::new();
    let pid_file = harness.dir.path().join("pids");
    let service = harness.service(
        &format!("sleep 30 &\necho $$ $! > '{}'\nwait", pid_file.display()),
        500,
    );

    let outcome = service
        .run_grading(&GradingRequest::new(b"{}".to_vec()))
        .unwrap();
    assert_eq!(outcome, WorkerOutcome::TimedOut);

    let pids: Vec<u32> = std::fs::read_to_string(&pid_file)
        .unwrap()
        .split_whitespace()
        .map(|p| p.parse().unwrap())
        .collect();
    assert_eq!(pids.len(), 2);

    // The shell is reaped by the waiter thread, possibly just after return
    let deadline = Instant::now() + Duration::from_secs(3);
    while !pids.iter().all(|&pid| is_dead(pid)) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    for pid in &pids {
        assert!(
            is_dead(*pid),
            "pid {} still running: {:?}",
            pid,
            process_state(*pid)
        );
    }
    assert_eq!(harness.leftover_areas(), 0);
}

#[test]
fn test_large_stderr_is_failed_with_full_content() {
    let harness = Harness::new();
    let service = harness.service(
        "head -c 100000 /dev/zero | tr '\\000' 'x' >&2\necho '<test-run/>' > \"$2/TestResult.xml\"",
        10_000,
    );

    let outcome = service
        .run_grading(&GradingRequest::new(b"{}".to_vec()))
        .unwrap();

    match outcome {
        WorkerOutcome::Failed { error_text } => {
            assert_eq!(error_text.len(), 100_000);
            assert!(error_text.bytes().all(|b| b == b'x'));
        }
        other => panic!("expected Failed, got {}", other),
    }
    assert_eq!(harness.leftover_areas(), 0);
}

#[test]
fn test_large_stdout_does_not_block_worker() {
    let harness = Harness::new();
    let service = harness.service(
        "head -c 1000000 /dev/zero\necho '<test-run/>' > \"$2/TestResult.xml\"",
        10_000,
    );

    let outcome = service
        .run_grading(&GradingRequest::new(b"{}".to_vec()))
        .unwrap();
    assert!(outcome.is_completed());
}

#[test]
fn test_missing_report_is_failed() {
    let harness = Harness::new();
    let service = harness.service("exit 0", 10_000);

    let result = service.grade(&GradingRequest::new(b"{}".to_vec())).unwrap();
    assert_eq!(result.outcome, WorkerOutcome::failed("report missing"));
    assert!(result.results.is_none());
}

#[test]
fn test_malformed_report_is_an_error() {
    let harness = Harness::new();
    let service = harness.service("echo '<results/>' > \"$2/TestResult.xml\"", 10_000);

    assert!(matches!(
        service.grade(&GradingRequest::new(b"{}".to_vec())),
        Err(GraderError::MalformedReport(_))
    ));
}

#[test]
fn test_unknown_task_does_not_run_worker() {
    let harness = Harness::new();
    let marker = harness.dir.path().join("ran");
    let service = harness.service(&format!("touch '{}'", marker.display()), 10_000);

    let request = GradingRequest::new(b"{}".to_vec()).with_task("AzureProjectTest.Nope");
    assert!(matches!(
        service.run_grading(&request),
        Err(GraderError::TaskNotFound(_))
    ));
    assert!(!marker.exists());
}

#[test]
fn test_concurrent_runs_are_isolated() {
    let harness = Harness::new();
    let service = std::sync::Arc::new(harness.service(
        "cat \"$1\" > \"$2/TestResult.xml\"",
        10_000,
    ));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let service = std::sync::Arc::clone(&service);
            std::thread::spawn(move || {
                let request = GradingRequest::new(format!("<test-run id=\"{}\"/>", i).into_bytes())
                    .with_trace("same@trace.io");
                (i, service.run_grading(&request).unwrap())
            })
        })
        .collect();

    for handle in handles {
        let (i, outcome) = handle.join().unwrap();
        assert_eq!(
            outcome,
            WorkerOutcome::Completed {
                report_text: format!("<test-run id=\"{}\"/>", i)
            }
        );
    }
    assert_eq!(harness.leftover_areas(), 0);
}

#[test]
fn test_task_listing_is_stable() {
    let harness = Harness::new();
    let service = harness.service("exit 0", 1_000);

    let first = serde_json::to_string(service.list_tasks()).unwrap();
    let second = serde_json::to_string(service.list_tasks()).unwrap();
    assert_eq!(first, second);

    let tasks: serde_json::Value = serde_json::from_str(&first).unwrap();
    assert_eq!(tasks[0]["gameClassOrder"], 1);
    assert_eq!(tasks[0]["reward"], 10);
    assert!(tasks
        .as_array()
        .unwrap()
        .iter()
        .all(|t| !t["tests"].as_array().unwrap().is_empty()));
}
