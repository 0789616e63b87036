// Startup validation for GraderConfig
// Fails fast on settings that would make every run fail, warns on risky ones

use crate::config::loader::GraderConfig;
use crate::config::types::{GraderError, Result};

/// Validation result with detailed errors
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate config at startup. Errors are fatal, warnings are returned.
pub fn validate_config(config: &GraderConfig) -> Result<ValidationResult> {
    let mut result = ValidationResult::new();

    validate_worker(config, &mut result);
    validate_scratch(config, &mut result);
    validate_rephrase(config, &mut result);

    if !result.is_valid() {
        return Err(GraderError::Config(format!(
            "Config validation failed:\n{}",
            result.errors.join("\n")
        )));
    }

    Ok(result)
}

fn validate_worker(config: &GraderConfig, result: &mut ValidationResult) {
    let worker = &config.worker;

    if worker.executable.as_os_str().is_empty() {
        result.add_error("worker.executable cannot be empty".to_string());
    }
    if worker.timeout_ms == 0 {
        result.add_error("worker.timeout_ms cannot be zero".to_string());
    } else if worker.timeout_ms < 1000 {
        result.add_warning(format!(
            "worker.timeout_ms {} is very low (< 1s), most runs will time out",
            worker.timeout_ms
        ));
    }
    if worker.report_file_name.trim().is_empty()
        || worker.report_file_name.contains('/')
    {
        result.add_error(format!(
            "worker.report_file_name must be a plain file name, got {:?}",
            worker.report_file_name
        ));
    }
    if worker.stderr_limit == 0 {
        result.add_warning(
            "worker.stderr_limit is zero, worker error text will not be reported".to_string(),
        );
    }
    if !worker.working_dir.exists() {
        result.add_warning(format!(
            "worker.working_dir {} does not exist",
            worker.working_dir.display()
        ));
    }
}

fn validate_scratch(config: &GraderConfig, result: &mut ValidationResult) {
    let name = &config.scratch.credentials_file_name;
    if name.trim().is_empty() || name.contains('/') {
        result.add_error(format!(
            "scratch.credentials_file_name must be a plain file name, got {:?}",
            name
        ));
    }
    if name == &config.worker.report_file_name {
        result.add_error(
            "scratch.credentials_file_name and worker.report_file_name must differ".to_string(),
        );
    }
    if config.scratch.base_dir.is_relative() {
        result.add_warning(format!(
            "scratch.base_dir {} is relative to the current directory",
            config.scratch.base_dir.display()
        ));
    }
}

fn validate_rephrase(config: &GraderConfig, result: &mut ValidationResult) {
    let rephrase = &config.rephrase;
    let partial = rephrase.endpoint.is_some()
        || rephrase.api_key.is_some()
        || rephrase.deployment.is_some();
    if partial && !rephrase.is_configured() {
        result.add_warning(
            "rephrase settings are incomplete, instructions will be served unchanged".to_string(),
        );
    }
    if rephrase.cache_ttl_secs == 0 {
        result.add_warning("rephrase.cache_ttl_secs is zero, caching is disabled".to_string());
    }
}
