//! Docker-backed SWE evaluation harness.
//!
//! Runs an external agent on `workspace.yaml` tasks inside Docker containers,
//! then verifies the result by executing fail_to_pass / pass_to_pass commands.
//! A task is correct when every one of those commands passes after the agent ran.

use std::path::PathBuf;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn, Instrument};

use super::task::{find_task, SweTask};
use super::validation::{validate_file_path, validate_git_ref, validate_repo_name};
use crate::attempt::RunContext;
use crate::error::EvalError;
use crate::eval::{EvalReport, EvalRequest, EvaluationService};

/// Default directory holding exported tasks.
pub const DEFAULT_TASKS_DIR: &str = "./generated-swe";

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Directory searched for `workspace.yaml` tasks.
    pub tasks_dir: PathBuf,
    /// Agent sources, mounted read-only at `/agent`.
    pub agent_dir: PathBuf,
    pub agent_cmd: String,
    pub agent_timeout_secs: u64,
    pub test_timeout_secs: u64,
    pub docker_image: String,
    pub keep_containers: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            tasks_dir: PathBuf::from(DEFAULT_TASKS_DIR),
            agent_dir: PathBuf::from("."),
            agent_cmd: "python -m baseagent".to_string(),
            agent_timeout_secs: 600,
            test_timeout_secs: 120,
            docker_image: "python:3.12-slim".to_string(),
            keep_containers: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarnessStatus {
    Resolved,
    Unresolved,
    AgentError,
    TestError,
    SetupError,
    SanityFail,
}

impl std::fmt::Display for HarnessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resolved => write!(f, "resolved"),
            Self::Unresolved => write!(f, "unresolved"),
            Self::AgentError => write!(f, "agent_error"),
            Self::TestError => write!(f, "test_error"),
            Self::SetupError => write!(f, "setup_error"),
            Self::SanityFail => write!(f, "sanity_fail"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub passed: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessResult {
    pub task_id: String,
    pub repo: String,
    /// Controller attempt this result belongs to.
    pub attempt: u32,
    pub status: HarnessStatus,
    pub sanity_check: bool,
    pub fail_to_pass: Vec<TestResult>,
    pub pass_to_pass: Vec<TestResult>,
    pub agent_duration_secs: f64,
    pub total_duration_secs: f64,
    pub agent_output: String,
    pub error: Option<String>,
    pub container_id: Option<String>,
}

impl HarnessResult {
    /// Creates a result in the `SetupError` state.
    pub fn new(task_id: impl Into<String>, repo: impl Into<String>, attempt: u32) -> Self {
        Self {
            task_id: task_id.into(),
            repo: repo.into(),
            attempt,
            status: HarnessStatus::SetupError,
            sanity_check: false,
            fail_to_pass: Vec::new(),
            pass_to_pass: Vec::new(),
            agent_duration_secs: 0.0,
            total_duration_secs: 0.0,
            agent_output: String::new(),
            error: None,
            container_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Docker helpers
// ---------------------------------------------------------------------------

async fn docker_exec(container: &str, cmd: &str, timeout_secs: u64) -> (i32, String, String) {
    let result = tokio::time::timeout(
        std::time::Duration::from_secs(timeout_secs),
        Command::new("docker")
            .args(["exec", container, "bash", "-c", cmd])
            .kill_on_drop(true)
            .output(),
    )
    .await;

    match result {
        Ok(Ok(output)) => (
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
        ),
        Ok(Err(e)) => (-1, String::new(), format!("exec error: {e}")),
        Err(_) => (-1, String::new(), format!("timed out after {timeout_secs}s")),
    }
}

async fn docker_rm(container: &str) {
    if let Err(e) = Command::new("docker")
        .args(["rm", "-f", container])
        .output()
        .await
    {
        debug!(container = container, error = %e, "Failed to remove container (may not exist)");
    }
}

async fn docker_write_file(container: &str, path: &str, content: &str) -> anyhow::Result<()> {
    use tokio::io::AsyncWriteExt;

    validate_file_path(path)?;
    let tee_cmd = format!("mkdir -p \"$(dirname '/repo/{path}')\" && cat > '/repo/{path}'");
    let mut child = Command::new("docker")
        .args(["exec", "-i", "-w", "/repo", container, "bash", "-c", &tee_cmd])
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;
    if let Some(ref mut stdin) = child.stdin {
        stdin.write_all(content.as_bytes()).await?;
        stdin.shutdown().await?;
    }
    let output = child.wait_with_output().await?;
    if !output.status.success() {
        anyhow::bail!("write failed: {}", String::from_utf8_lossy(&output.stderr));
    }
    Ok(())
}

/// Removes a container when dropped while still armed.
///
/// Covers evaluations dropped mid-flight by an attempt timeout or by
/// cancellation, which never reach the async cleanup in [`TaskRun::execute`].
/// Removal is synchronous: the next attempt starts only after the container
/// is gone.
struct ContainerGuard {
    container: String,
    armed: bool,
}

impl ContainerGuard {
    fn new(container: &str, armed: bool) -> Self {
        Self {
            container: container.to_string(),
            armed,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!(container = %self.container, "Evaluation interrupted, removing container");
        if let Err(e) = std::process::Command::new("docker")
            .args(["rm", "-f", &self.container])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
        {
            debug!(container = %self.container, error = %e, "Failed to remove interrupted container");
        }
    }
}

fn container_name(task_id: &str, attempt: u32) -> String {
    let safe = task_id.replace('/', "-").replace(' ', "_");
    format!("swe-harness-{safe}-a{attempt}")
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        format!("{}... [truncated]", &s[..end])
    }
}

/// Single-quotes `s` for `bash -c`.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

fn agent_command(agent_cmd: &str, prompt: &str) -> String {
    format!(
        "cd /repo && {} --prompt {} --workdir /repo 2>&1",
        agent_cmd,
        shell_quote(prompt)
    )
}

fn docker_run_args(
    container: &str,
    agent_dir: &str,
    image: &str,
    env: &[(String, String)],
) -> Vec<String> {
    let mut args: Vec<String> = ["run", "-d", "--name", container, "--network=host", "--memory=32g"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    for (key, value) in env {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
    }
    args.extend([
        "-v".to_string(),
        format!("{agent_dir}:/agent:ro"),
        "-w".to_string(),
        "/repo".to_string(),
        image.to_string(),
        "sleep".to_string(),
        "7200".to_string(),
    ]);
    args
}

// ---------------------------------------------------------------------------
// Per-task evaluation
// ---------------------------------------------------------------------------

/// One evaluation of one task in its own container.
struct TaskRun<'a> {
    task: &'a SweTask,
    config: &'a HarnessConfig,
    container: String,
    result: HarnessResult,
}

impl<'a> TaskRun<'a> {
    fn new(task: &'a SweTask, config: &'a HarnessConfig, attempt: u32) -> Self {
        let container = container_name(&task.id, attempt);
        let mut result = HarnessResult::new(&task.id, &task.repo, attempt);
        result.container_id = Some(container.clone());
        Self {
            task,
            config,
            container,
            result,
        }
    }

    async fn execute(mut self, env: &[(String, String)]) -> HarnessResult {
        let started = Instant::now();
        let mut guard = ContainerGuard::new(&self.container, !self.config.keep_containers);
        if let Err(message) = self.run_steps(env).await {
            self.result.error = Some(message);
        }
        if !self.config.keep_containers {
            docker_rm(&self.container).await;
        }
        guard.disarm();
        self.result.total_duration_secs = started.elapsed().as_secs_f64();
        self.result
    }

    async fn run_steps(&mut self, env: &[(String, String)]) -> Result<(), String> {
        self.validate_inputs()?;
        self.start_container(env).await?;
        self.prepare_repo().await?;
        self.sanity_check().await?;
        self.run_agent().await?;
        self.verify().await;
        Ok(())
    }

    fn validate_inputs(&self) -> Result<(), String> {
        validate_repo_name(&self.task.repo).map_err(|e| format!("Invalid repo name: {e}"))?;
        if !self.task.base_commit.is_empty() {
            validate_git_ref(&self.task.base_commit)
                .map_err(|e| format!("Invalid base commit: {e}"))?;
        }
        Ok(())
    }

    async fn start_container(&self, env: &[(String, String)]) -> Result<(), String> {
        let task_id = &self.task.id;
        let agent_dir = match std::env::var("DOCKER_AGENT_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::fs::canonicalize(&self.config.agent_dir)
                .unwrap_or_else(|_| self.config.agent_dir.clone()),
        };

        info!(task_id = %task_id, image = %self.config.docker_image, "Starting container {}", self.container);
        docker_rm(&self.container).await;

        let args = docker_run_args(
            &self.container,
            &agent_dir.display().to_string(),
            &self.config.docker_image,
            env,
        );
        match Command::new("docker")
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
        {
            Ok(o) if o.status.success() => Ok(()),
            Ok(o) => Err(format!(
                "Failed to start container: {}",
                String::from_utf8_lossy(&o.stderr)
            )),
            Err(e) => Err(format!("Docker not available: {e}")),
        }
    }

    async fn exec(&self, cmd: &str, timeout_secs: u64) -> (i32, String, String) {
        docker_exec(&self.container, cmd, timeout_secs).await
    }

    async fn prepare_repo(&self) -> Result<(), String> {
        let task_id = &self.task.id;

        let (code, _, err) = self
            .exec(
                "apt-get update -qq && apt-get install -y -qq git curl build-essential python3 python3-pip python3-venv > /dev/null 2>&1 && (command -v python >/dev/null 2>&1 || ln -sf $(command -v python3) /usr/local/bin/python)",
                180,
            )
            .await;
        if code != 0 {
            return Err(format!("Failed to install system deps: {}", truncate(&err, 500)));
        }

        let clone_cmd = format!("git clone https://github.com/{}.git /repo 2>&1", self.task.repo);
        let (code, _, err) = self.exec(&clone_cmd, 600).await;
        if code != 0 {
            return Err(format!("Clone failed: {}", truncate(&err, 500)));
        }

        if !self.task.base_commit.is_empty() {
            let checkout = format!("cd /repo && git checkout {} --force 2>&1", self.task.base_commit);
            let (code, _, err) = self.exec(&checkout, 60).await;
            if code != 0 {
                return Err(format!("Checkout failed: {}", truncate(&err, 500)));
            }
        }

        if let Some(install_cmd) = self.task.install_config.get("install").filter(|c| !c.is_empty()) {
            info!(task_id = %task_id, "Installing deps: {}", install_cmd);
            let (code, _, err) = self.exec(&format!("cd /repo && {install_cmd} 2>&1"), 300).await;
            if code != 0 {
                warn!(task_id = %task_id, "Install command failed (continuing): {}", truncate(&err, 200));
            }
        }

        let (code, _, _) = self
            .exec(
                "test -f /agent/requirements.txt && pip install --break-system-packages -q -r /agent/requirements.txt 2>&1 || true",
                180,
            )
            .await;
        if code != 0 {
            warn!(task_id = %task_id, "Agent requirements install returned non-zero (continuing)");
        }

        let files = self.task.test_files();
        for tf in &files {
            if let Err(e) = docker_write_file(&self.container, &tf.path, &tf.content).await {
                warn!(task_id = %task_id, path = %tf.path, "Failed to copy test file: {}", e);
            }
        }
        if !files.is_empty() {
            info!(task_id = %task_id, "Copied {} test files into container", files.len());
        }
        Ok(())
    }

    /// fail_to_pass must fail and pass_to_pass must pass before the agent runs.
    async fn sanity_check(&mut self) -> Result<(), String> {
        let task = self.task;
        for cmd in &task.fail_to_pass {
            let (code, _, _) = self
                .exec(&format!("cd /repo && {cmd}"), self.config.test_timeout_secs)
                .await;
            if code == 0 {
                self.result.status = HarnessStatus::SanityFail;
                return Err(format!("fail_to_pass command already passes on base commit: {cmd}"));
            }
        }
        for cmd in &task.pass_to_pass {
            let (code, _, _) = self
                .exec(&format!("cd /repo && {cmd}"), self.config.test_timeout_secs)
                .await;
            if code != 0 {
                self.result.status = HarnessStatus::SanityFail;
                return Err(format!("pass_to_pass command fails on base commit: {cmd}"));
            }
        }
        self.result.sanity_check = true;
        info!(task_id = %task.id, "Sanity check passed");
        Ok(())
    }

    async fn run_agent(&mut self) -> Result<(), String> {
        info!(task_id = %self.task.id, "Running agent: {}", self.config.agent_cmd);
        let cmd = agent_command(&self.config.agent_cmd, &self.task.prompt);

        let started = Instant::now();
        let (code, stdout, stderr) = self.exec(&cmd, self.config.agent_timeout_secs).await;
        self.result.agent_duration_secs = started.elapsed().as_secs_f64();
        self.result.agent_output = truncate(&format!("{stdout}\n{stderr}"), 10_000);

        if code != 0 && stderr.contains("timed out") {
            self.result.status = HarnessStatus::AgentError;
            return Err(format!("Agent timed out after {}s", self.config.agent_timeout_secs));
        }
        if code != 0 {
            warn!(task_id = %self.task.id, exit_code = code, "Agent exited with non-zero code (continuing to test)");
        }
        Ok(())
    }

    async fn run_tests(&self, commands: &[String]) -> Vec<TestResult> {
        let mut results = Vec::with_capacity(commands.len());
        for cmd in commands {
            let started = Instant::now();
            let (code, stdout, stderr) = self
                .exec(&format!("cd /repo && {cmd}"), self.config.test_timeout_secs)
                .await;
            results.push(TestResult {
                command: cmd.clone(),
                exit_code: code,
                stdout: truncate(&stdout, 2000),
                stderr: truncate(&stderr, 2000),
                passed: code == 0,
                duration_ms: started.elapsed().as_millis() as u64,
            });
        }
        results
    }

    async fn verify(&mut self) {
        let task = self.task;
        info!(task_id = %task.id, "Verifying test results...");
        self.result.fail_to_pass = self.run_tests(&task.fail_to_pass).await;
        self.result.pass_to_pass = self.run_tests(&task.pass_to_pass).await;
        self.result.status = verdict(&self.result.fail_to_pass, &self.result.pass_to_pass);
        if self.result.status == HarnessStatus::TestError {
            self.result.error = Some("Task has no fail_to_pass or pass_to_pass commands".to_string());
        }

        let passed = |tests: &[TestResult]| tests.iter().filter(|t| t.passed).count();
        info!(
            task_id = %task.id,
            status = %self.result.status,
            "f2p: {}/{}, p2p: {}/{}",
            passed(&self.result.fail_to_pass),
            self.result.fail_to_pass.len(),
            passed(&self.result.pass_to_pass),
            self.result.pass_to_pass.len()
        );
    }
}

/// A task without any verification command cannot be resolved.
fn verdict(fail_to_pass: &[TestResult], pass_to_pass: &[TestResult]) -> HarnessStatus {
    if fail_to_pass.is_empty() && pass_to_pass.is_empty() {
        HarnessStatus::TestError
    } else if fail_to_pass.iter().chain(pass_to_pass).all(|t| t.passed) {
        HarnessStatus::Resolved
    } else {
        HarnessStatus::Unresolved
    }
}

/// Evaluates `task`, trying again on setup errors up to `max_tries` times in total.
async fn evaluate_task(
    task: SweTask,
    config: HarnessConfig,
    env: Vec<(String, String)>,
    attempt: u32,
    max_tries: u32,
) -> HarnessResult {
    let max_tries = max_tries.max(1);
    let mut tries = 1;
    loop {
        let result = TaskRun::new(&task, &config, attempt).execute(&env).await;
        if result.status != HarnessStatus::SetupError || tries >= max_tries {
            return result;
        }
        warn!(
            task_id = %task.id,
            tries,
            max_tries,
            error = result.error.as_deref().unwrap_or(""),
            "Setup failed, trying again"
        );
        tries += 1;
    }
}

/// Error message when no task of a call got past setup.
fn setup_failure(results: &[HarnessResult]) -> Option<String> {
    if results.is_empty() || results.iter().any(|r| r.status != HarnessStatus::SetupError) {
        return None;
    }
    let message = results
        .iter()
        .find_map(|r| r.error.as_deref())
        .unwrap_or("no task could be set up");
    Some(format!("{} task(s) failed setup: {}", results.len(), message))
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Evaluation service running tasks in Docker containers.
#[derive(Debug, Clone, Default)]
pub struct DockerHarness {
    config: HarnessConfig,
}

impl DockerHarness {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Resolves every id of `taskset` to a task under the tasks directory.
    pub fn resolve_tasks(&self, taskset: &[String]) -> Result<Vec<SweTask>, EvalError> {
        taskset
            .iter()
            .map(|id| find_task(&self.config.tasks_dir, id))
            .collect()
    }
}

#[async_trait]
impl EvaluationService for DockerHarness {
    async fn evaluate(
        &self,
        request: &EvalRequest,
        ctx: &RunContext,
    ) -> Result<EvalReport, EvalError> {
        let tasks = self.resolve_tasks(&request.taskset)?;
        let runner = &request.runner;
        let concurrency = runner.concurrency.max(1);

        let mut env = ctx.env_vars();
        env.extend(request.solver.env_vars());

        info!(
            tasks = tasks.len(),
            concurrency,
            multiprocessing = runner.use_multiprocessing,
            recorder = runner.recorder.name(),
            "Evaluating taskset"
        );

        let mut results = Vec::with_capacity(tasks.len());
        for chunk in tasks.chunks(concurrency) {
            let chunk_results = if runner.use_multiprocessing {
                let handles: Vec<_> = chunk
                    .iter()
                    .cloned()
                    .map(|task| {
                        let fut = evaluate_task(
                            task,
                            self.config.clone(),
                            env.clone(),
                            ctx.attempt(),
                            runner.max_retries,
                        );
                        tokio::spawn(fut.in_current_span())
                    })
                    .collect();
                let mut out = Vec::with_capacity(handles.len());
                for handle in handles {
                    out.push(
                        handle
                            .await
                            .map_err(|e| EvalError::Crashed(format!("Task panicked: {e}")))?,
                    );
                }
                out
            } else {
                join_all(chunk.iter().cloned().map(|task| {
                    evaluate_task(
                        task,
                        self.config.clone(),
                        env.clone(),
                        ctx.attempt(),
                        runner.max_retries,
                    )
                }))
                .await
            };

            for result in &chunk_results {
                runner.recorder.record_result(ctx, result);
            }
            results.extend(chunk_results);
        }

        if let Some(message) = setup_failure(&results) {
            warn!(error = %message, "Evaluation environment failed");
            return Err(EvalError::Setup(message));
        }

        let report = EvalReport::from_results(results);
        runner.recorder.record_report(ctx, &report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{Recorder, SolverConfig};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CollectingRecorder {
        seen: Mutex<Vec<(u32, String, HarnessStatus)>>,
    }

    impl Recorder for CollectingRecorder {
        fn name(&self) -> &str {
            "collecting"
        }

        fn record_result(&self, ctx: &RunContext, result: &HarnessResult) {
            self.seen
                .lock()
                .unwrap()
                .push((ctx.attempt(), result.task_id.clone(), result.status));
        }
    }

    fn write_task(root: &std::path::Path, id: &str, repo: &str) {
        let dir = root.join(id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(crate::swe::WORKSPACE_FILE),
            format!("id: {id}\nrepo: {repo}\nfail_to_pass:\n  - pytest\n"),
        )
        .unwrap();
    }

    fn test_result(passed: bool) -> TestResult {
        TestResult {
            command: "pytest".to_string(),
            exit_code: if passed { 0 } else { 1 },
            stdout: String::new(),
            stderr: String::new(),
            passed,
            duration_ms: 10,
        }
    }

    #[test]
    fn test_harness_config_default() {
        let config = HarnessConfig::default();
        assert_eq!(config.tasks_dir, PathBuf::from("./generated-swe"));
        assert_eq!(config.agent_timeout_secs, 600);
        assert_eq!(config.test_timeout_secs, 120);
        assert_eq!(config.docker_image, "python:3.12-slim");
        assert!(!config.keep_containers);
    }

    #[test]
    fn test_harness_status_display() {
        assert_eq!(HarnessStatus::Resolved.to_string(), "resolved");
        assert_eq!(HarnessStatus::Unresolved.to_string(), "unresolved");
        assert_eq!(HarnessStatus::AgentError.to_string(), "agent_error");
        assert_eq!(HarnessStatus::SanityFail.to_string(), "sanity_fail");
    }

    #[test]
    fn test_container_name_includes_attempt() {
        assert_eq!(container_name("owner/repo-123", 1), "swe-harness-owner-repo-123-a1");
        assert_eq!(container_name("owner/repo name", 7), "swe-harness-owner-repo_name-a7");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("12345", 5), "12345");
        assert!(truncate("hello world this is long", 10).ends_with("... [truncated]"));
        assert!(truncate("héllo wörld", 2).starts_with('h'));
    }

    #[test]
    fn test_agent_command_quotes_prompt() {
        let cmd = agent_command("python -m baseagent", "don't break");
        assert_eq!(
            cmd,
            "cd /repo && python -m baseagent --prompt 'don'\\''t break' --workdir /repo 2>&1"
        );
    }

    #[test]
    fn test_docker_run_args_inject_env() {
        let mut ctx = RunContext::new("T1", 7);
        ctx.begin_attempt(3);
        let env = ctx.env_vars();

        let args = docker_run_args("c1", "/agents/base", "python:3.12-slim", &env);
        assert_eq!(&args[..3], ["run", "-d", "--name"]);
        assert!(args.contains(&"SWELANCER_SESSION_ID=SWELancer - Task T1".to_string()));
        assert!(args.contains(&"SWELANCER_ATTEMPT=3".to_string()));
        assert!(args.contains(&"/agents/base:/agent:ro".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("7200"));
    }

    #[test]
    fn test_verdict() {
        assert_eq!(verdict(&[test_result(true)], &[test_result(true)]), HarnessStatus::Resolved);
        assert_eq!(verdict(&[test_result(false)], &[test_result(true)]), HarnessStatus::Unresolved);
        assert_eq!(verdict(&[test_result(true)], &[test_result(false)]), HarnessStatus::Unresolved);
        assert_eq!(verdict(&[], &[test_result(true)]), HarnessStatus::Resolved);
    }

    #[test]
    fn test_verdict_without_commands_is_a_test_error() {
        assert_eq!(verdict(&[], &[]), HarnessStatus::TestError);
    }

    #[test]
    fn test_setup_failure_only_when_every_task_failed_setup() {
        assert_eq!(setup_failure(&[]), None);

        let mut failed = HarnessResult::new("T1", "owner/repo", 1);
        failed.error = Some("Docker not available: not found".to_string());
        let message = setup_failure(std::slice::from_ref(&failed)).unwrap();
        assert!(message.contains("Docker not available"));

        let mut unresolved = HarnessResult::new("T2", "owner/repo", 1);
        unresolved.status = HarnessStatus::Unresolved;
        assert_eq!(setup_failure(&[failed, unresolved]), None);
    }

    #[test]
    fn test_harness_result_serialization() {
        let mut result = HarnessResult::new("test-1", "owner/repo", 2);
        result.status = HarnessStatus::Resolved;
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"task_id\":\"test-1\""));
        assert!(json.contains("\"attempt\":2"));
        assert!(json.contains("\"resolved\""));
    }

    #[test]
    fn test_resolve_tasks_missing() {
        let tmp = TempDir::new().unwrap();
        let harness = DockerHarness::new(HarnessConfig {
            tasks_dir: tmp.path().to_path_buf(),
            ..HarnessConfig::default()
        });
        let err = harness.resolve_tasks(&["T1".to_string()]).unwrap_err();
        assert!(matches!(err, EvalError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn test_evaluate_unknown_task_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let harness = DockerHarness::new(HarnessConfig {
            tasks_dir: tmp.path().to_path_buf(),
            ..HarnessConfig::default()
        });
        let request = EvalRequest::for_task("missing", SolverConfig::default());
        let ctx = RunContext::new("missing", 7);

        let result = harness.evaluate(&request, &ctx).await;
        assert!(matches!(result, Err(EvalError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_repo_is_a_setup_error() {
        let task = SweTask::new("T1", "not a repo");
        let result = evaluate_task(task, HarnessConfig::default(), Vec::new(), 1, 1).await;
        assert_eq!(result.status, HarnessStatus::SetupError);
        assert!(result.error.unwrap().contains("Invalid repo name"));
    }

    #[tokio::test]
    async fn test_evaluate_setup_failure_is_an_error() {
        let tmp = TempDir::new().unwrap();
        write_task(tmp.path(), "T1", "not a repo");
        let harness = DockerHarness::new(HarnessConfig {
            tasks_dir: tmp.path().to_path_buf(),
            ..HarnessConfig::default()
        });
        let request = EvalRequest::for_task("T1", SolverConfig::default());
        let mut ctx = RunContext::new("T1", 7);
        ctx.begin_attempt(1);

        let err = harness.evaluate(&request, &ctx).await.unwrap_err();
        match err {
            EvalError::Setup(message) => assert!(message.contains("Invalid repo name")),
            other => panic!("expected setup error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_evaluate_spawns_tasks_with_multiprocessing() {
        let tmp = TempDir::new().unwrap();
        write_task(tmp.path(), "T1", "not a repo");
        write_task(tmp.path(), "T2", "also/not/a/repo");
        let harness = DockerHarness::new(HarnessConfig {
            tasks_dir: tmp.path().to_path_buf(),
            ..HarnessConfig::default()
        });

        let recorder = Arc::new(CollectingRecorder::default());
        let mut request = EvalRequest::for_task("T1", SolverConfig::default());
        request.taskset.push("T2".to_string());
        request.runner.concurrency = 2;
        request.runner.use_multiprocessing = true;
        request.runner.recorder = recorder.clone();
        let mut ctx = RunContext::new("T1", 7);
        ctx.begin_attempt(3);

        let err = harness.evaluate(&request, &ctx).await.unwrap_err();
        assert!(matches!(err, EvalError::Setup(_)));

        let seen = recorder.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                (3, "T1".to_string(), HarnessStatus::SetupError),
                (3, "T2".to_string(), HarnessStatus::SetupError),
            ]
        );
    }
}
