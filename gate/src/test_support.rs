//! Test-only helpers for building plans and throwaway project roots.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::core::types::{PlanStep, StepStatus};
use crate::state::SessionState;

/// Pending plan steps with the given contents, in order.
pub fn steps(contents: &[&str]) -> Vec<PlanStep> {
    contents
        .iter()
        .map(|content| PlanStep::new(*content, StepStatus::Pending))
        .collect()
}

/// Plan steps with explicit statuses.
pub fn steps_with(entries: &[(&str, StepStatus)]) -> Vec<PlanStep> {
    entries
        .iter()
        .map(|(content, status)| PlanStep::new(*content, *status))
        .collect()
}

/// JSON `tool_input.todos` payload for a TodoWrite request.
pub fn todos_json(entries: &[(&str, &str)]) -> serde_json::Value {
    let todos = entries
        .iter()
        .map(|(content, status)| {
            serde_json::json!({
                "content": content,
                "status": status,
                "activeForm": content,
            })
        })
        .collect::<Vec<_>>();
    serde_json::json!({ "todos": todos })
}

/// Temporary project root with the `sessions/` directory in place.
pub struct TestProject {
    temp: tempfile::TempDir,
    root: PathBuf,
}

impl TestProject {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().canonicalize().expect("canonical tempdir");
        fs::create_dir_all(root.join("sessions")).expect("create sessions dir");
        Self { temp, root }
    }

    /// Project root that is also a git repository on `branch`.
    pub fn with_git(branch: &str) -> Self {
        let project = Self::new();
        git_init(&project.root, branch);
        project
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp.path()
    }

    /// Write `contents` to a project-relative path, creating parents.
    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    pub fn write_state(&self, state: &SessionState) {
        let body = serde_json::to_string_pretty(state).expect("serialize state");
        self.write("sessions/sessions-state.json", &body);
    }

    pub fn read_state(&self) -> SessionState {
        let body = fs::read_to_string(self.root.join("sessions/sessions-state.json"))
            .expect("read state");
        serde_json::from_str(&body).expect("parse state")
    }

    /// Nested repository at `rel` on `branch`.
    pub fn add_repo(&self, rel: &str, branch: &str) -> PathBuf {
        let path = self.root.join(rel);
        fs::create_dir_all(&path).expect("create repo dir");
        git_init(&path, branch);
        path
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize a repository at `path` with one commit on `branch`.
pub fn git_init(path: &Path, branch: &str) {
    run_git(path, &["init", "-q"]);
    run_git(path, &["config", "user.email", "gate@example.com"]);
    run_git(path, &["config", "user.name", "gate"]);
    run_git(path, &["checkout", "-q", "-b", branch]);
    run_git(path, &["commit", "-q", "--allow-empty", "-m", "init"]);
}

/// Check out `branch` in the repository at `path`, creating it if needed.
pub fn git_checkout(path: &Path, branch: &str) {
    let exists = Command::new("git")
        .args(["show-ref", "--verify", "--quiet", &format!("refs/heads/{branch}")])
        .current_dir(path)
        .status()
        .expect("spawn git show-ref")
        .success();
    if exists {
        run_git(path, &["checkout", "-q", branch]);
    } else {
        run_git(path, &["checkout", "-q", "-b", branch]);
    }
}

fn run_git(path: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(path)
        .status()
        .expect("spawn git");
    assert!(status.success(), "git {} failed", args.join(" "));
}
