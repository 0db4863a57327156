//! Error types for swe-retry operations.
//!
//! Three layers, each with its own enum:
//! - Configuration of a run (fatal, raised before any attempt)
//! - Evaluation service failures (one attempt could not produce a report)
//! - Attempt controller failures (what finally ends a run abnormally)

use std::time::Duration;

use thiserror::Error;

/// Errors raised while validating the inputs of a run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Exactly one task ID is supported per run, got {count}")]
    TaskCount { count: usize },

    #[error("Task ID must not be empty")]
    EmptyTaskId,
}

/// Errors raised by an evaluation service instead of returning a report.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Task '{0}' not found")]
    TaskNotFound(String),

    #[error("Tasks directory does not exist: {0}")]
    TasksDir(String),

    #[error("Setup error: {0}")]
    Setup(String),

    #[error("Evaluation crashed: {0}")]
    Crashed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors that end a run before it reaches a terminal state.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Attempt {attempt} failed: {source}")]
    Evaluation {
        attempt: u32,
        #[source]
        source: EvalError,
    },

    #[error("Attempt {attempt} timed out after {timeout:?}")]
    TimedOut { attempt: u32, timeout: Duration },

    #[error("Run cancelled during attempt {attempt}")]
    Cancelled { attempt: u32 },
}

impl AttemptError {
    /// Returns true for errors raised before any attempt was made.
    pub fn is_config(&self) -> bool {
        matches!(self, AttemptError::Config(_))
    }

    /// Attempt number the error occurred in, if an attempt had started.
    pub fn attempt(&self) -> Option<u32> {
        match self {
            AttemptError::Config(_) => None,
            AttemptError::Evaluation { attempt, .. }
            | AttemptError::TimedOut { attempt, .. }
            | AttemptError::Cancelled { attempt } => Some(*attempt),
        }
    }
}
