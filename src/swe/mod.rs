//! SWE tasks and the Docker harness that evaluates them.
//!
//! Tasks are read from `workspace.yaml` files (one directory per task) and
//! evaluated by [`DockerHarness`], the production [`crate::eval::EvaluationService`].

pub mod harness;
pub mod task;
pub mod validation;

pub use harness::{
    DockerHarness, HarnessConfig, HarnessResult, HarnessStatus, TestResult, DEFAULT_TASKS_DIR,
};
pub use task::{discover_tasks, find_task, load_task, SweTask, TestFile, WORKSPACE_FILE};
pub use validation::{validate_file_path, validate_git_ref, validate_repo_name};
