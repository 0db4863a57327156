//! Result recorders.

use std::sync::Arc;

use crate::attempt::RunContext;
use crate::swe::HarnessResult;

use super::EvalReport;

/// Receives results as an evaluation call produces them.
pub trait Recorder: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Called once per evaluated task.
    fn record_result(&self, ctx: &RunContext, result: &HarnessResult);

    /// Called once per evaluation call with the final report.
    fn record_report(&self, _ctx: &RunContext, _report: &EvalReport) {}
}

/// Recorder that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

impl Recorder for NoopRecorder {
    fn name(&self) -> &str {
        "noop"
    }

    fn record_result(&self, _ctx: &RunContext, _result: &HarnessResult) {}
}

/// Returns the inert recorder used for controller-driven runs.
pub fn dummy_recorder() -> Arc<dyn Recorder> {
    Arc::new(NoopRecorder)
}
