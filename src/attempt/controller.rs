//! The attempt loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};

use super::config::ControllerConfig;
use super::context::RunContext;
use crate::error::{AttemptError, ConfigError};
use crate::eval::{EvalReport, EvalRequest, EvaluationService, SolverConfig};

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    /// Session label not yet published.
    Init,
    /// Attempt `attempt` is in flight.
    Attempting { attempt: u32 },
    /// Attempt `attempt` produced at least one correct answer.
    Succeeded { attempt: u32 },
    /// Every attempt completed without a correct answer.
    Exhausted,
}

impl RunState {
    /// Moves `Init` to the first attempt. Other states are returned unchanged.
    pub fn start(self) -> RunState {
        match self {
            RunState::Init => RunState::Attempting { attempt: 1 },
            other => other,
        }
    }

    /// Applies the correct-count of the current attempt.
    ///
    /// Only `Attempting` moves; `Init` and terminal states are returned unchanged.
    pub fn advance(self, num_correct: usize, max_attempts: u32) -> RunState {
        match self {
            RunState::Attempting { attempt } if num_correct > 0 => {
                RunState::Succeeded { attempt }
            }
            RunState::Attempting { attempt } if attempt < max_attempts => RunState::Attempting {
                attempt: attempt + 1,
            },
            RunState::Attempting { .. } => RunState::Exhausted,
            other => other,
        }
    }

    /// Returns true for `Succeeded` and `Exhausted`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded { .. } | RunState::Exhausted)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Init => write!(f, "init"),
            RunState::Attempting { attempt } => write!(f, "attempting({})", attempt),
            RunState::Succeeded { attempt } => write!(f, "succeeded({})", attempt),
            RunState::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Final outcome of a run that reached a terminal state.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub task_id: String,
    pub session_label: String,
    /// `Succeeded` or `Exhausted`.
    pub state: RunState,
    /// Number of evaluation calls made.
    pub attempts_made: u32,
    pub max_attempts: u32,
    /// Report of the most recent attempt that returned one.
    pub last_report: Option<EvalReport>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RunOutcome {
    /// Returns true if some attempt produced a correct answer.
    pub fn is_success(&self) -> bool {
        matches!(self.state, RunState::Succeeded { .. })
    }
}

/// Returns the single task id of a run, or a configuration error.
pub fn select_task_id(task_ids: &[String]) -> Result<&str, ConfigError> {
    match task_ids {
        [task_id] if task_id.trim().is_empty() => Err(ConfigError::EmptyTaskId),
        [task_id] => Ok(task_id.as_str()),
        _ => Err(ConfigError::TaskCount {
            count: task_ids.len(),
        }),
    }
}

/// Runs one task through an evaluation service until it succeeds or runs
/// out of attempts.
pub struct AttemptController<S> {
    service: S,
    config: ControllerConfig,
    cancel: CancellationToken,
}

impl<S: EvaluationService> AttemptController<S> {
    /// Creates a controller over `service`.
    pub fn new(service: S, config: ControllerConfig) -> Self {
        Self {
            service,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `token` to cancel the run from outside.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels the in-flight attempt and ends the run.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Runs the attempt loop for the single task in `task_ids`.
    ///
    /// Running out of attempts is a normal outcome (`RunState::Exhausted`).
    /// Errors are returned for a wrong task count, cancellation, and failed
    /// evaluation calls the crash policy does not absorb.
    pub async fn run(
        &self,
        task_ids: &[String],
        solver: &SolverConfig,
    ) -> Result<RunOutcome, AttemptError> {
        let task_id = select_task_id(task_ids)?;
        let max_attempts = self.config.max_attempts;
        let mut ctx = RunContext::new(task_id, max_attempts);
        let started_at = Utc::now();

        info!(
            task_id = %task_id,
            run_id = %ctx.run_id(),
            session = %ctx.session_label(),
            max_attempts,
            crash_policy = %self.config.crash_policy,
            "Starting run"
        );

        let mut state = RunState::Init.start();
        let mut attempts_made = 0;
        let mut last_report = None;

        while let RunState::Attempting { attempt } = state {
            ctx.begin_attempt(attempt);
            attempts_made = attempt;
            info!("Running attempt {}/{}", attempt, max_attempts);

            let request = EvalRequest::for_task(task_id, solver.clone());
            let num_correct = match self.run_attempt(&request, &ctx).await {
                Ok(report) => {
                    info!(attempt, "--> {}", report);
                    let num_correct = report.num_correct();
                    last_report = Some(report);
                    num_correct
                }
                Err(err) if self.config.crash_policy.retries(&err) => {
                    warn!(attempt, error = %err, "Attempt failed, counting it as used");
                    0
                }
                Err(err) => {
                    error!(attempt, error = %err, "Attempt failed, aborting run");
                    return Err(err);
                }
            };

            state = state.advance(num_correct, max_attempts);
            if num_correct == 0 {
                info!(attempt, "No correct answers, retrying...");
            }
        }

        match state {
            RunState::Succeeded { attempt } => {
                info!(task_id = %task_id, attempt, "Task solved");
            }
            _ => {
                warn!(
                    task_id = %task_id,
                    attempts = attempts_made,
                    "Ran out of attempts without a correct answer"
                );
            }
        }

        Ok(RunOutcome {
            run_id: ctx.run_id().to_string(),
            task_id: task_id.to_string(),
            session_label: ctx.session_label().to_string(),
            state,
            attempts_made,
            max_attempts,
            last_report,
            started_at,
            completed_at: Utc::now(),
        })
    }

    /// Makes one evaluation call under the timeout and cancellation token.
    async fn run_attempt(
        &self,
        request: &EvalRequest,
        ctx: &RunContext,
    ) -> Result<EvalReport, AttemptError> {
        let attempt = ctx.attempt();
        if self.cancel.is_cancelled() {
            return Err(AttemptError::Cancelled { attempt });
        }

        let evaluation = async {
            let call = self.service.evaluate(request, ctx).instrument(ctx.span());
            match self.config.attempt_timeout {
                Some(timeout) => match tokio::time::timeout(timeout, call).await {
                    Ok(result) => {
                        result.map_err(|source| AttemptError::Evaluation { attempt, source })
                    }
                    Err(_) => Err(AttemptError::TimedOut { attempt, timeout }),
                },
                None => call
                    .await
                    .map_err(|source| AttemptError::Evaluation { attempt, source }),
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AttemptError::Cancelled { attempt }),
            result = evaluation => result,
        }
    }
}
