/// Configuration loading from gradebox.json plus environment overrides
use crate::config::types::{GraderError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default wall-clock budget for one worker run (5 minutes)
pub const DEFAULT_TIMEOUT_MS: u64 = 5 * 60 * 1000;

/// Default expiry of a rephrased instruction (15 minutes)
pub const DEFAULT_REPHRASE_TTL_SECS: u64 = 15 * 60;

/// Config file looked up in the current directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "gradebox.json";

/// Worker process settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Grading worker executable
    pub executable: PathBuf,
    /// Leading arguments placed before the four standard ones
    /// (e.g. the assembly when the executable is an interpreter)
    pub args: Vec<String>,
    /// Working directory for the worker (its bundle location)
    pub working_dir: PathBuf,
    /// Hard wall-clock budget in milliseconds
    pub timeout_ms: u64,
    /// Report file the worker writes into the scratch directory
    pub report_file_name: String,
    /// Bytes of stdout retained per run
    pub stdout_limit: usize,
    /// Bytes of stderr retained per run. Longer stderr is still drained, and
    /// the failure text keeps this prefix plus a truncation marker.
    pub stderr_limit: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("AzureProjectTest"),
            args: Vec::new(),
            working_dir: PathBuf::from("."),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            report_file_name: "TestResult.xml".to_string(),
            stdout_limit: 8 * 1024 * 1024,
            stderr_limit: 2 * 1024 * 1024,
        }
    }
}

impl WorkerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Scratch area settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScratchSettings {
    /// Parent directory of every per-request scratch area
    pub base_dir: PathBuf,
    /// Name of the credential file written into each scratch area
    pub credentials_file_name: String,
    /// Scratch roots older than this are removed by `sweep`
    pub stale_after_secs: u64,
}

impl Default for ScratchSettings {
    fn default() -> Self {
        Self {
            base_dir: std::env::temp_dir().join("gradebox"),
            credentials_file_name: "azureauth.json".to_string(),
            stale_after_secs: 60 * 60,
        }
    }
}

/// Task selection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    /// Filter handed to the worker when no task is named.
    /// Empty means the worker runs its whole battery.
    pub default_filter: String,
}

/// Rephrasing collaborator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RephraseSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub deployment: Option<String>,
    pub api_version: String,
    pub request_timeout_ms: u64,
    pub cache_ttl_secs: u64,
}

impl Default for RephraseSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            deployment: None,
            api_version: "2024-02-01".to_string(),
            request_timeout_ms: 30_000,
            cache_ttl_secs: DEFAULT_REPHRASE_TTL_SECS,
        }
    }
}

impl RephraseSettings {
    /// All three connection values are present
    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some() && self.api_key.is_some() && self.deployment.is_some()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Full gradebox.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraderConfig {
    pub worker: WorkerSettings,
    pub scratch: ScratchSettings,
    pub tasks: TaskSettings,
    pub rephrase: RephraseSettings,
}

impl GraderConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GraderError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&content)
            .map_err(|e| GraderError::Config(format!("Failed to parse config JSON: {}", e)))
    }

    /// Load ./gradebox.json when present, defaults otherwise, then apply the
    /// process environment on top
    pub fn load_default() -> Result<Self> {
        let config_path = std::env::current_dir()
            .map_err(|e| GraderError::Config(format!("Failed to get current directory: {}", e)))?
            .join(DEFAULT_CONFIG_FILE);

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            log::debug!(
                "{} not found in current directory, using defaults",
                DEFAULT_CONFIG_FILE
            );
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function so tests can
    /// supply their own environment
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(exe) = lookup("GRADEBOX_WORKER") {
            self.worker.executable = PathBuf::from(exe);
        }
        if let Some(dir) = lookup("GRADEBOX_WORKER_DIR") {
            self.worker.working_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("GRADEBOX_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                GraderError::Config(format!("GRADEBOX_TIMEOUT_SECS is not a number: {}", secs))
            })?;
            self.worker.timeout_ms = secs.saturating_mul(1000);
        }
        if let Some(dir) = lookup("GRADEBOX_SCRATCH_DIR") {
            self.scratch.base_dir = PathBuf::from(dir);
        }
        if let Some(filter) = lookup("GRADEBOX_DEFAULT_FILTER") {
            self.tasks.default_filter = filter;
        }
        if let Some(endpoint) = lookup("AZURE_OPENAI_ENDPOINT") {
            self.rephrase.endpoint = Some(endpoint);
        }
        if let Some(key) = lookup("AZURE_OPENAI_API_KEY") {
            self.rephrase.api_key = Some(key);
        }
        if let Some(deployment) = lookup("DEPLOYMENT_OR_MODEL_NAME") {
            self.rephrase.deployment = Some(deployment);
        }
        Ok(())
    }
}
