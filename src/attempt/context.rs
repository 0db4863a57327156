//! Run-scoped context shared with the evaluation service.

use serde::Serialize;
use tracing::Span;
use uuid::Uuid;

/// Prefix of the human-readable session label.
pub const SESSION_LABEL_PREFIX: &str = "SWELancer - Task";

/// Environment variable carrying the session label into the agent container.
pub const SESSION_ID_ENV: &str = "SWELANCER_SESSION_ID";

/// Environment variable carrying the current attempt number into the agent container.
pub const ATTEMPT_ENV: &str = "SWELANCER_ATTEMPT";

/// Identifiers of one run, threaded explicitly into every evaluation call.
///
/// The session label is fixed at construction. The attempt number starts at
/// 0 (no attempt yet) and is overwritten by the controller before each call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunContext {
    run_id: String,
    task_id: String,
    session_label: String,
    attempt: u32,
    max_attempts: u32,
}

impl RunContext {
    /// Creates the context for a run over `task_id`.
    pub fn new(task_id: impl Into<String>, max_attempts: u32) -> Self {
        let task_id = task_id.into();
        Self {
            run_id: format!("run-{}", Uuid::new_v4()),
            session_label: Self::session_label_for(&task_id),
            task_id,
            attempt: 0,
            max_attempts,
        }
    }

    /// Derives the session label for a task id.
    pub fn session_label_for(task_id: &str) -> String {
        format!("{} {}", SESSION_LABEL_PREFIX, task_id)
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn session_label(&self) -> &str {
        &self.session_label
    }

    /// Current attempt number (1-based; 0 before the first attempt).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Publishes `attempt` as the current attempt number.
    pub(crate) fn begin_attempt(&mut self, attempt: u32) {
        self.attempt = attempt;
    }

    /// Environment pairs handed to processes spawned for this attempt.
    pub fn env_vars(&self) -> Vec<(String, String)> {
        vec![
            (SESSION_ID_ENV.to_string(), self.session_label.clone()),
            (ATTEMPT_ENV.to_string(), self.attempt.to_string()),
        ]
    }

    /// Span grouping every log line emitted during the current attempt.
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "attempt",
            session = %self.session_label,
            run_id = %self.run_id,
            attempt = self.attempt
        )
    }
}
