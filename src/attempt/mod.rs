//! Attempt controller for single-task evaluation runs.
//!
//! A run evaluates exactly one task. The controller calls the evaluation
//! service up to `max_attempts` times, one after another, and stops at the
//! first report with a correct answer.
//!
//! # Architecture
//!
//! ```text
//! task id → RunContext (session label) → attempt 1..=N → EvaluationService → EvalReport
//!                                              ↑                                  │
//!                                              └──── num_correct == 0 ────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use swe_retry::attempt::{AttemptController, ControllerConfig};
//! use swe_retry::eval::SolverConfig;
//! use swe_retry::swe::{DockerHarness, HarnessConfig};
//!
//! let harness = DockerHarness::new(HarnessConfig::default());
//! let controller = AttemptController::new(harness, ControllerConfig::new());
//!
//! let outcome = controller
//!     .run(&["123_456".to_string()], &SolverConfig::new("deepseek-reasoner"))
//!     .await?;
//! println!("{} after {} attempts", outcome.state, outcome.attempts_made);
//! ```

pub mod config;
pub mod context;
pub mod controller;

pub use config::{ControllerConfig, CrashPolicy, DEFAULT_MAX_ATTEMPTS};
pub use context::{RunContext, ATTEMPT_ENV, SESSION_ID_ENV, SESSION_LABEL_PREFIX};
pub use controller::{select_task_id, AttemptController, RunOutcome, RunState};
