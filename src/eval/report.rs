//! Evaluation reports.

use serde::{Deserialize, Serialize};

use crate::swe::{HarnessResult, HarnessStatus};

/// Counts over the tasks of one evaluation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregations {
    #[serde(default)]
    pub num_tasks: usize,
    /// Tasks resolved by the agent. Missing values read as zero.
    #[serde(default)]
    pub num_correct: usize,
    /// Tasks evaluated but not resolved.
    #[serde(default)]
    pub num_incorrect: usize,
    /// Tasks that could not be evaluated (setup, sanity, agent or test errors).
    #[serde(default)]
    pub num_errors: usize,
    #[serde(default)]
    pub avg_agent_time_secs: f64,
}

/// Report of one evaluation call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalReport {
    #[serde(default)]
    pub aggregations: Aggregations,
    #[serde(default)]
    pub results: Vec<HarnessResult>,
}

impl EvalReport {
    /// Builds a report from per-task results.
    pub fn from_results(results: Vec<HarnessResult>) -> Self {
        let count = |status: HarnessStatus| results.iter().filter(|r| r.status == status).count();
        let num_correct = count(HarnessStatus::Resolved);
        let num_incorrect = count(HarnessStatus::Unresolved);

        let agent_times: Vec<f64> = results
            .iter()
            .filter(|r| r.agent_duration_secs > 0.0)
            .map(|r| r.agent_duration_secs)
            .collect();
        let avg_agent_time = if agent_times.is_empty() {
            0.0
        } else {
            agent_times.iter().sum::<f64>() / agent_times.len() as f64
        };

        Self {
            aggregations: Aggregations {
                num_tasks: results.len(),
                num_correct,
                num_incorrect,
                num_errors: results.len() - num_correct - num_incorrect,
                avg_agent_time_secs: (avg_agent_time * 10.0).round() / 10.0,
            },
            results,
        }
    }

    /// Report carrying only counts, for services that do not expose per-task results.
    pub fn from_counts(num_correct: usize, num_incorrect: usize) -> Self {
        Self {
            aggregations: Aggregations {
                num_tasks: num_correct + num_incorrect,
                num_correct,
                num_incorrect,
                ..Aggregations::default()
            },
            results: Vec::new(),
        }
    }

    /// Aggregate count of correct outcomes.
    pub fn num_correct(&self) -> usize {
        self.aggregations.num_correct
    }
}

impl std::fmt::Display for EvalReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let agg = &self.aggregations;
        write!(
            f,
            "tasks={} correct={} incorrect={} errors={} avg_agent_time={:.1}s",
            agg.num_tasks,
            agg.num_correct,
            agg.num_incorrect,
            agg.num_errors,
            agg.avg_agent_time_secs
        )?;
        for r in &self.results {
            write!(f, " [{}: {}", r.task_id, r.status)?;
            if let Some(err) = &r.error {
                write!(f, " ({})", err)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}
