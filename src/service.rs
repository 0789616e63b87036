/// Grading service facade
/// Wires the registry, resolver, scratch manager, orchestrator and rephrase
/// cache into the operations the front end calls.
use crate::config::loader::GraderConfig;
use crate::config::types::{GraderError, GradingRequest, Result, ResultMap, WorkerOutcome};
use crate::exec::orchestrator::ProcessOrchestrator;
use crate::observability::audit::{events, Correlation};
use crate::rephrase::{self, AzureOpenAiRephraser, RephraseCache, Rephraser};
use crate::report::parser;
use crate::safety::scratch::ScratchManager;
use crate::tasks::{FilterResolver, TaskDescriptor, TaskRegistry};
use crate::utils::trace;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a run plus the parsed results when it completed
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GradingResult {
    #[serde(flatten)]
    pub outcome: WorkerOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<ResultMap>,
}

pub struct GradingService {
    config: GraderConfig,
    registry: Arc<TaskRegistry>,
    resolver: FilterResolver,
    scratch: ScratchManager,
    orchestrator: ProcessOrchestrator,
    cache: RephraseCache,
    rephraser: Option<Box<dyn Rephraser>>,
}

impl GradingService {
    /// Service over the built-in task catalog
    pub fn new(config: GraderConfig) -> Result<Self> {
        Ok(Self::with_registry(config, TaskRegistry::builtin()?))
    }

    pub fn with_registry(config: GraderConfig, registry: TaskRegistry) -> Self {
        let registry = Arc::new(registry);
        let resolver = FilterResolver::new(Arc::clone(&registry), config.tasks.default_filter.clone());
        let scratch = ScratchManager::new(
            config.scratch.base_dir.clone(),
            config.scratch.credentials_file_name.clone(),
        );
        let orchestrator = ProcessOrchestrator::new(config.worker.clone());
        let cache = RephraseCache::new(config.rephrase.cache_ttl());
        let rephraser = AzureOpenAiRephraser::from_settings(&config.rephrase)
            .map(|r| Box::new(r) as Box<dyn Rephraser>);

        if rephraser.is_none() {
            log::debug!("Rephrasing not configured, instructions served unchanged");
        }

        Self {
            config,
            registry,
            resolver,
            scratch,
            orchestrator,
            cache,
            rephraser,
        }
    }

    /// Replace the rephrasing collaborator
    pub fn with_rephraser(mut self, rephraser: Box<dyn Rephraser>) -> Self {
        self.rephraser = Some(rephraser);
        self
    }

    pub fn config(&self) -> &GraderConfig {
        &self.config
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Resolve the task, run the worker in a fresh scratch area and remove the
    /// area afterwards. An unknown task fails before anything is created.
    pub fn run_grading(&self, request: &GradingRequest) -> Result<WorkerOutcome> {
        let trace_token = trace::normalize_trace(request.trace_token.as_deref());

        let filter = match self.resolver.resolve(request.task.as_deref()) {
            Ok(filter) => filter,
            Err(e @ GraderError::TaskNotFound(_)) => {
                events::task_not_found(&trace_token, request.task.as_deref().unwrap_or_default());
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let area = self.scratch.acquire(&trace_token, &request.credentials)?;
        let correlation = Correlation::new(&trace_token, area.run_id());
        events::run_start(&correlation, &filter);

        let outcome = self.orchestrator.run(&area, &correlation, &filter);

        if area.cleanup() {
            events::cleanup_success(&correlation, area.root());
        } else {
            events::cleanup_failure(&correlation, area.root());
        }

        Ok(outcome)
    }

    /// Run and, when the run completed, parse its report
    pub fn grade(&self, request: &GradingRequest) -> Result<GradingResult> {
        let outcome = self.run_grading(request)?;
        let results = match &outcome {
            WorkerOutcome::Completed { report_text } => Some(parser::parse_report(report_text)?),
            WorkerOutcome::TimedOut | WorkerOutcome::Failed { .. } => None,
        };
        Ok(GradingResult { outcome, results })
    }

    pub fn list_tasks(&self) -> &[TaskDescriptor] {
        self.registry.list()
    }

    /// Task list with each instruction rephrased through the cache
    pub fn list_tasks_rephrased(&self) -> Vec<TaskDescriptor> {
        self.registry
            .list()
            .iter()
            .map(|task| TaskDescriptor {
                instruction: rephrase::rephrase_cached(
                    &self.cache,
                    self.rephraser.as_deref(),
                    &task.instruction,
                    rephrase::pick_variant(),
                ),
                ..task.clone()
            })
            .collect()
    }

    pub fn parse_report(&self, text: &str) -> Result<ResultMap> {
        parser::parse_report(text)
    }

    /// Remove scratch roots left behind by crashed runs
    pub fn sweep_stale(&self, max_age: Option<Duration>) -> Result<usize> {
        let max_age =
            max_age.unwrap_or_else(|| Duration::from_secs(self.config.scratch.stale_after_secs));
        self.scratch.sweep_stale(max_age)
    }
}
