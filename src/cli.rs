use crate::config::loader::GraderConfig;
use crate::config::types::GradingRequest;
use crate::config::validator;
use crate::service::GradingService;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to ./gradebox.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Also append audit events as JSON lines to this file
    #[arg(long, global = true)]
    audit_log: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the grading battery against a student's environment
    Run {
        /// Credential file handed to the worker; `-` reads stdin
        #[arg(long)]
        credentials_file: PathBuf,
        /// Free-text trace; an e-mail address inside it becomes the trace token
        #[arg(long)]
        trace: Option<String>,
        /// Task name to run; omitted runs the whole battery
        #[arg(long)]
        task: Option<String>,
        /// Wall-clock budget in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Worker executable
        #[arg(long)]
        worker: Option<PathBuf>,
        /// Worker working directory
        #[arg(long)]
        worker_dir: Option<PathBuf>,
    },
    /// List the game tasks as JSON
    Tasks {
        /// Rephrase instructions through the configured rephrasing service
        #[arg(long)]
        rephrase: bool,
    },
    /// Reduce a report file to its pass/fail map
    ParseReport {
        /// Report file (NUnit XML)
        file: PathBuf,
    },
    /// Remove scratch areas left behind by crashed runs
    Sweep {
        /// Minimum age in seconds (defaults to scratch.stale_after_secs)
        #[arg(long)]
        max_age_secs: Option<u64>,
    },
}

fn load_config(path: Option<&Path>) -> Result<GraderConfig> {
    let config = match path {
        Some(path) => {
            let mut config = GraderConfig::load_from_file(path)?;
            config.apply_env(|key| std::env::var(key).ok())?;
            config
        }
        None => GraderConfig::load_default()?,
    };
    Ok(config)
}

fn read_credentials(path: &Path) -> Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("Failed to read credentials from stdin")?;
        return Ok(buf);
    }
    std::fs::read(path)
        .with_context(|| format!("Failed to read credentials file {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn run() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    if let Some(path) = &cli.audit_log {
        crate::observability::audit::init_audit_log(path)?;
    }

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            credentials_file,
            trace,
            task,
            timeout_secs,
            worker,
            worker_dir,
        } => {
            if let Some(secs) = timeout_secs {
                config.worker.timeout_ms = secs.saturating_mul(1000);
            }
            if let Some(worker) = worker {
                config.worker.executable = worker;
            }
            if let Some(dir) = worker_dir {
                config.worker.working_dir = dir;
            }

            let validation = validator::validate_config(&config)?;
            for warning in &validation.warnings {
                log::warn!("{}", warning);
            }

            let mut request = GradingRequest::new(read_credentials(&credentials_file)?);
            request.trace_token = trace;
            request.task = task;

            let service = GradingService::new(config)?;
            let result = service.grade(&request)?;
            print_json(&result)?;

            if !result.outcome.is_completed() {
                std::process::exit(1);
            }
        }
        Commands::Tasks { rephrase } => {
            let service = GradingService::new(config)?;
            if rephrase {
                print_json(&service.list_tasks_rephrased())?;
            } else {
                print_json(&service.list_tasks())?;
            }
        }
        Commands::ParseReport { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read report {}", file.display()))?;
            let service = GradingService::new(config)?;
            print_json(&service.parse_report(&text)?)?;
        }
        Commands::Sweep { max_age_secs } => {
            let service = GradingService::new(config)?;
            let removed = service.sweep_stale(max_age_secs.map(Duration::from_secs))?;
            print_json(&serde_json::json!({ "removed": removed }))?;
        }
    }

    Ok(())
}
