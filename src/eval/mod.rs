//! Evaluation service seam.
//!
//! The attempt controller only knows this trait. One call evaluates a set
//! of tasks once and returns an [`EvalReport`].

pub mod recorder;
pub mod report;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::attempt::RunContext;
use crate::error::EvalError;

pub use recorder::{dummy_recorder, NoopRecorder, Recorder};
pub use report::{Aggregations, EvalReport};

/// Default solver model.
pub const DEFAULT_MODEL: &str = "deepseek-reasoner";

/// Per-task tries inside the service. Retrying lives in the attempt controller.
pub const INTERNAL_RETRY_BUDGET: u32 = 1;

/// Something that evaluates a taskset once.
#[async_trait]
pub trait EvaluationService: Send + Sync {
    /// Evaluates `request.taskset` for the attempt described by `ctx`.
    async fn evaluate(
        &self,
        request: &EvalRequest,
        ctx: &RunContext,
    ) -> Result<EvalReport, EvalError>;
}

#[async_trait]
impl<T: EvaluationService + ?Sized> EvaluationService for Arc<T> {
    async fn evaluate(
        &self,
        request: &EvalRequest,
        ctx: &RunContext,
    ) -> Result<EvalReport, EvalError> {
        (**self).evaluate(request, ctx).await
    }
}

/// Agent/solver settings forwarded to the evaluated agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Model the agent should use.
    pub model: String,
    /// Free-form setting handed to the agent untouched.
    pub custom_setting: Option<String>,
    /// API key for the agent's model provider.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl SolverConfig {
    /// Creates a solver config for `model`.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            custom_setting: None,
            api_key: None,
        }
    }

    /// Sets the custom setting.
    pub fn with_custom_setting(mut self, setting: impl Into<String>) -> Self {
        self.custom_setting = Some(setting.into());
        self
    }

    /// Sets the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Environment pairs describing the solver to the agent process.
    pub fn env_vars(&self) -> Vec<(String, String)> {
        let mut env = vec![("AGENT_MODEL".to_string(), self.model.clone())];
        if let Some(setting) = &self.custom_setting {
            env.push(("AGENT_CUSTOM_SETTING".to_string(), setting.clone()));
        }
        if let Some(key) = &self.api_key {
            env.push(("OPENROUTER_API_KEY".to_string(), key.clone()));
        }
        env
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}

/// Runner settings of one evaluation call.
#[derive(Clone)]
pub struct RunnerArgs {
    /// Tasks evaluated at the same time inside the service.
    pub concurrency: usize,
    /// Evaluate each task on its own spawned tokio task.
    pub use_multiprocessing: bool,
    /// Sink for per-task results.
    pub recorder: Arc<dyn Recorder>,
    /// Tries per task for setup failures inside the service.
    pub max_retries: u32,
}

impl std::fmt::Debug for RunnerArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerArgs")
            .field("concurrency", &self.concurrency)
            .field("use_multiprocessing", &self.use_multiprocessing)
            .field("recorder", &self.recorder.name())
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Input of one evaluation call.
#[derive(Debug, Clone)]
pub struct EvalRequest {
    /// Task ids to evaluate.
    pub taskset: Vec<String>,
    pub solver: SolverConfig,
    pub runner: RunnerArgs,
}

impl EvalRequest {
    /// Builds the request the attempt controller sends for a single task:
    /// concurrency equal to the taskset size, no multiprocessing, an inert
    /// recorder and a single internal try.
    pub fn for_task(task_id: impl Into<String>, solver: SolverConfig) -> Self {
        let taskset = vec![task_id.into()];
        let concurrency = taskset.len();
        Self {
            taskset,
            solver,
            runner: RunnerArgs {
                concurrency,
                use_multiprocessing: false,
                recorder: dummy_recorder(),
                max_retries: INTERNAL_RETRY_BUDGET,
            },
        }
    }
}
