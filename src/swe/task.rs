//! SWE tasks as exported in `workspace.yaml` files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::EvalError;

/// File name of an exported task.
pub const WORKSPACE_FILE: &str = "workspace.yaml";

/// The subset of a `workspace.yaml` task the harness needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweTask {
    /// Task identifier (the issue id).
    pub id: String,
    /// GitHub repository in `owner/repo` form.
    pub repo: String,
    /// Commit the agent starts from.
    #[serde(default)]
    pub base_commit: String,
    #[serde(default = "default_language")]
    pub language: String,
    /// Commands that must fail before and pass after the agent's change.
    #[serde(default)]
    pub fail_to_pass: Vec<String>,
    /// Commands that must pass before and after.
    #[serde(default)]
    pub pass_to_pass: Vec<String>,
    /// Install hints; the `install` key is run before the agent.
    #[serde(default)]
    pub install_config: BTreeMap<String, String>,
    /// Extra metadata; `test_files` holds a JSON list of [`TestFile`].
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    /// Problem statement shown to the agent.
    #[serde(default)]
    pub prompt: String,
}

fn default_language() -> String {
    "unknown".to_string()
}

impl SweTask {
    /// Creates a task with empty commands.
    pub fn new(id: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            repo: repo.into(),
            base_commit: String::new(),
            language: default_language(),
            fail_to_pass: Vec::new(),
            pass_to_pass: Vec::new(),
            install_config: BTreeMap::new(),
            meta: BTreeMap::new(),
            prompt: String::new(),
        }
    }

    /// Test files to copy into the container before verification.
    pub fn test_files(&self) -> Vec<TestFile> {
        self.meta
            .get("test_files")
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }
}

/// A test file shipped with a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFile {
    pub path: String,
    pub content: String,
}

/// Load a task from a `workspace.yaml` file.
pub fn load_task(workspace_yaml: &Path) -> Result<SweTask, EvalError> {
    let content = std::fs::read_to_string(workspace_yaml)?;
    let task: SweTask = serde_yaml::from_str(&content)?;
    Ok(task)
}

/// Discover all `workspace.yaml` files under a directory, sorted.
pub fn discover_tasks(input_dir: &Path) -> Vec<PathBuf> {
    fn walk(dir: &Path, paths: &mut Vec<PathBuf>) {
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let p = entry.path();
                if p.is_dir() {
                    walk(&p, paths);
                } else if p.file_name().map(|f| f == WORKSPACE_FILE).unwrap_or(false) {
                    paths.push(p);
                }
            }
        }
    }

    let mut paths = Vec::new();
    walk(input_dir, &mut paths);
    paths.sort();
    paths
}

/// Find the task with `task_id` under `tasks_dir`.
///
/// A task matches when its `id` equals `task_id` or when its directory is
/// named `task_id`. Unreadable files are skipped with a warning.
pub fn find_task(tasks_dir: &Path, task_id: &str) -> Result<SweTask, EvalError> {
    if !tasks_dir.is_dir() {
        return Err(EvalError::TasksDir(tasks_dir.display().to_string()));
    }

    for path in discover_tasks(tasks_dir) {
        let dir_matches = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|name| name == task_id)
            .unwrap_or(false);

        match load_task(&path) {
            Ok(task) if task.id == task_id || dir_matches => {
                debug!(task_id, path = %path.display(), "Resolved task");
                return Ok(task);
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to load {}: {}", path.display(), e),
        }
    }

    Err(EvalError::TaskNotFound(task_id.to_string()))
}
