//! swe-retry: evaluate a single SWE task with an agent, retrying the whole
//! evaluation until an attempt resolves it.
//!
//! The [`attempt`] module holds the retry loop, [`eval`] the service seam it
//! calls, and [`swe`] the Docker harness implementing that seam.

pub mod attempt;
pub mod cli;
pub mod error;
pub mod eval;
pub mod swe;

pub use attempt::{AttemptController, ControllerConfig, CrashPolicy, RunContext, RunOutcome, RunState};
pub use error::{AttemptError, ConfigError, EvalError};
pub use eval::{EvalReport, EvalRequest, EvaluationService, SolverConfig};
