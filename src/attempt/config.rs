//! Configuration for the attempt controller.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AttemptError;

/// Number of attempts made for a task before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 7;

/// What a failed evaluation call (no report) does to the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrashPolicy {
    /// Propagate the failure and end the run.
    #[default]
    Abort,
    /// Count the failure as a used attempt and keep going.
    CountAsAttempt,
}

impl CrashPolicy {
    /// Returns true if `error` should consume an attempt instead of ending the run.
    ///
    /// Cancellation and configuration errors always end the run.
    pub fn retries(&self, error: &AttemptError) -> bool {
        match self {
            CrashPolicy::Abort => false,
            CrashPolicy::CountAsAttempt => matches!(
                error,
                AttemptError::Evaluation { .. } | AttemptError::TimedOut { .. }
            ),
        }
    }
}

impl std::fmt::Display for CrashPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrashPolicy::Abort => write!(f, "abort"),
            CrashPolicy::CountAsAttempt => write!(f, "count_as_attempt"),
        }
    }
}

/// Configuration for an attempt controller run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Maximum number of sequential attempts (at least 1).
    pub max_attempts: u32,
    /// Upper bound for a single evaluation call. `None` waits indefinitely.
    pub attempt_timeout: Option<Duration>,
    /// Handling of evaluation calls that fail instead of returning a report.
    pub crash_policy: CrashPolicy,
}

impl ControllerConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempt_timeout: None,
            crash_policy: CrashPolicy::Abort,
        }
    }

    /// Sets the maximum number of attempts. Values below 1 are raised to 1.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Time-boxes each evaluation call.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Sets the crash policy.
    pub fn with_crash_policy(mut self, policy: CrashPolicy) -> Self {
        self.crash_policy = policy;
        self
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, EvalError};

    #[test]
    fn test_controller_config_defaults() {
        let config = ControllerConfig::new();
        assert_eq!(config.max_attempts, 7);
        assert!(config.attempt_timeout.is_none());
        assert_eq!(config.crash_policy, CrashPolicy::Abort);
    }

    #[test]
    fn test_controller_config_builder() {
        let config = ControllerConfig::new()
            .with_max_attempts(3)
            .with_attempt_timeout(Duration::from_secs(900))
            .with_crash_policy(CrashPolicy::CountAsAttempt);

        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.attempt_timeout, Some(Duration::from_secs(900)));
        assert_eq!(config.crash_policy, CrashPolicy::CountAsAttempt);
    }

    #[test]
    fn test_max_attempts_floor() {
        let config = ControllerConfig::new().with_max_attempts(0);
        assert_eq!(config.max_attempts, 1);
    }

    #[test]
    fn test_crash_policy_retries() {
        let crash = AttemptError::Evaluation {
            attempt: 1,
            source: EvalError::Crashed("boom".to_string()),
        };
        let timeout = AttemptError::TimedOut {
            attempt: 1,
            timeout: Duration::from_secs(1),
        };
        let cancelled = AttemptError::Cancelled { attempt: 1 };
        let config: AttemptError = ConfigError::EmptyTaskId.into();

        assert!(!CrashPolicy::Abort.retries(&crash));
        assert!(!CrashPolicy::Abort.retries(&timeout));
        assert!(CrashPolicy::CountAsAttempt.retries(&crash));
        assert!(CrashPolicy::CountAsAttempt.retries(&timeout));
        assert!(!CrashPolicy::CountAsAttempt.retries(&cancelled));
        assert!(!CrashPolicy::CountAsAttempt.retries(&config));
    }

    #[test]
    fn test_crash_policy_display() {
        assert_eq!(CrashPolicy::Abort.to_string(), "abort");
        assert_eq!(CrashPolicy::CountAsAttempt.to_string(), "count_as_attempt");
    }
}
