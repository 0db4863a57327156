//! CLI definition and command implementation for swe-retry.

use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use crate::attempt::{select_task_id, AttemptController, ControllerConfig, CrashPolicy, RunOutcome};
use crate::eval::{SolverConfig, DEFAULT_MODEL};
use crate::swe::{DockerHarness, HarnessConfig, DEFAULT_TASKS_DIR};

/// Default command used to launch the agent inside the container.
const DEFAULT_AGENT_CMD: &str = "python -m baseagent";

/// Default Docker image for task containers.
const DEFAULT_DOCKER_IMAGE: &str = "python:3.12-slim";

/// Default agent timeout in seconds.
const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 600;

/// Default timeout in seconds per test command.
const DEFAULT_TEST_TIMEOUT_SECS: u64 = 120;

/// Evaluate a single SWE task with an autonomous agent, retrying until it is solved.
#[derive(Parser, Debug)]
#[command(name = "swe-retry")]
#[command(about = "Evaluate one SWE task with an agent, retrying until it is solved")]
#[command(version)]
#[command(
    long_about = "swe-retry runs an agent against one exported SWE task inside Docker and verifies it with the task's tests.\n\nThe whole evaluation is repeated up to 7 times and stops at the first attempt that resolves the task.\n\nExample usage:\n  swe-retry --issue-ids 123_456 --tasks-dir ./generated-swe --agent-dir ./baseagent"
)]
pub struct Cli {
    /// Task (issue) ID to evaluate. Exactly one must be given.
    #[arg(long = "issue-ids", alias = "issue_ids", num_args = 0..)]
    pub issue_ids: Vec<String>,

    /// Free-form setting passed to the agent (AGENT_CUSTOM_SETTING).
    #[arg(long = "custom-setting", alias = "custom_setting")]
    pub custom_setting: Option<String>,

    /// Model the agent should use (AGENT_MODEL).
    #[arg(short = 'm', long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// OpenRouter API key forwarded to the agent container.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Directory containing exported tasks (one workspace.yaml per task).
    #[arg(short = 't', long, default_value = DEFAULT_TASKS_DIR)]
    pub tasks_dir: String,

    /// Agent directory mounted read-only at /agent.
    #[arg(long, default_value = ".")]
    pub agent_dir: String,

    /// Command launching the agent inside the container.
    #[arg(long, default_value = DEFAULT_AGENT_CMD)]
    pub agent_cmd: String,

    /// Docker image for task containers.
    #[arg(long, default_value = DEFAULT_DOCKER_IMAGE)]
    pub docker_image: String,

    /// Agent timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_AGENT_TIMEOUT_SECS)]
    pub agent_timeout: u64,

    /// Timeout in seconds per test command.
    #[arg(long, default_value_t = DEFAULT_TEST_TIMEOUT_SECS)]
    pub test_timeout: u64,

    /// Keep task containers after evaluation.
    #[arg(long)]
    pub keep_containers: bool,

    /// Abandon a single attempt after this many seconds. Unbounded when unset.
    #[arg(long)]
    pub attempt_timeout: Option<u64>,

    /// Count a failed evaluation call as a used attempt instead of aborting.
    #[arg(long)]
    pub retry_on_crash: bool,

    /// Output the final outcome as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Harness settings from the parsed arguments.
    pub fn harness_config(&self) -> HarnessConfig {
        HarnessConfig {
            tasks_dir: PathBuf::from(&self.tasks_dir),
            agent_dir: PathBuf::from(&self.agent_dir),
            agent_cmd: self.agent_cmd.clone(),
            agent_timeout_secs: self.agent_timeout,
            test_timeout_secs: self.test_timeout,
            docker_image: self.docker_image.clone(),
            keep_containers: self.keep_containers,
        }
    }

    /// Solver settings from the parsed arguments.
    pub fn solver_config(&self) -> SolverConfig {
        let mut solver = SolverConfig::new(&self.model);
        if let Some(setting) = &self.custom_setting {
            solver = solver.with_custom_setting(setting);
        }
        if let Some(key) = &self.api_key {
            solver = solver.with_api_key(key);
        }
        solver
    }

    /// Controller settings from the parsed arguments.
    pub fn controller_config(&self) -> ControllerConfig {
        let mut config = ControllerConfig::new();
        if let Some(secs) = self.attempt_timeout {
            config = config.with_attempt_timeout(Duration::from_secs(secs));
        }
        if self.retry_on_crash {
            config = config.with_crash_policy(CrashPolicy::CountAsAttempt);
        }
        config
    }
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse CLI arguments and run.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
///
/// Returns an error for a task count other than one (before any work) and
/// for evaluation failures the crash policy does not absorb. Running out of
/// attempts is not an error.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let task_id = select_task_id(&cli.issue_ids)?;

    let agent_dir = Path::new(&cli.agent_dir);
    if !agent_dir.exists() {
        return Err(anyhow::anyhow!(
            "Agent directory does not exist: {}",
            cli.agent_dir
        ));
    }

    let controller = AttemptController::new(
        DockerHarness::new(cli.harness_config()),
        cli.controller_config(),
    );

    let token = controller.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            token.cancel();
        }
    });

    info!(
        "Evaluating task {} from {} with agent from {}",
        task_id, cli.tasks_dir, cli.agent_dir
    );
    let outcome = controller
        .run(&cli.issue_ids, &cli.solver_config())
        .await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        let mut text = String::new();
        render_outcome(&mut text, &outcome)?;
        print!("{text}");
    }

    Ok(())
}

/// Writes a human-readable summary of a finished run to `out`.
fn render_outcome(out: &mut impl Write, outcome: &RunOutcome) -> std::fmt::Result {
    writeln!(out, "\n=== Run Results ===")?;
    writeln!(out, "Task:      {}", outcome.task_id)?;
    writeln!(out, "Session:   {}", outcome.session_label)?;
    writeln!(out, "Outcome:   {}", outcome.state)?;
    writeln!(
        out,
        "Attempts:  {}/{}",
        outcome.attempts_made, outcome.max_attempts
    )?;

    if let Some(report) = &outcome.last_report {
        let agg = &report.aggregations;
        writeln!(
            out,
            "Last report: correct={} incorrect={} errors={} avg agent time={:.1}s",
            agg.num_correct, agg.num_incorrect, agg.num_errors, agg.avg_agent_time_secs
        )?;
        for r in &report.results {
            let f2p_ok = r.fail_to_pass.iter().filter(|t| t.passed).count();
            let p2p_ok = r.pass_to_pass.iter().filter(|t| t.passed).count();
            writeln!(
                out,
                "  {} [{}] f2p={}/{} p2p={}/{} agent={:.1}s",
                r.task_id,
                r.status,
                f2p_ok,
                r.fail_to_pass.len(),
                p2p_ok,
                r.pass_to_pass.len(),
                r.agent_duration_secs,
            )?;
            if let Some(err) = &r.error {
                writeln!(out, "    error: {err}")?;
            }
        }
    }
    Ok(())
}
