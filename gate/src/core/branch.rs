//! Branch and task-scope consistency for a repository owning an edited file.

use serde::Serialize;

use crate::core::types::BranchCheckOutcome;
use crate::state::TaskState;

/// Shown as the actual branch when HEAD is detached.
pub const DETACHED_HEAD: &str = "HEAD (detached)";

/// What the git adapter observed about the repository owning a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoObservation {
    /// Directory name of the repository (`svcA`), or the project directory
    /// name for the root repository.
    pub name: String,
    /// Repository path relative to the project root (`.` for the root).
    pub rel_path: String,
    pub is_root: bool,
    /// Checked-out branch; `None` for a detached HEAD.
    pub branch: Option<String>,
}

/// Evaluated branch check, carrying everything messages and audit events need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchFinding {
    pub outcome: BranchCheckOutcome,
    pub repo: String,
    pub repo_path: String,
    pub expected: String,
    pub actual: String,
}

/// Compare the observed repository against the task's branch and scope.
///
/// The root repository is always part of the task; nested repositories must
/// be listed in `submodules` by directory name.
pub fn check_branch(task: &TaskState, expected: &str, repo: &RepoObservation) -> BranchFinding {
    let declared = repo.is_root || task.declares(&repo.name);
    let matches = repo.branch.as_deref() == Some(expected);
    BranchFinding {
        outcome: BranchCheckOutcome::from_flags(declared, matches),
        repo: repo.name.clone(),
        repo_path: repo.rel_path.clone(),
        expected: expected.to_string(),
        actual: repo
            .branch
            .clone()
            .unwrap_or_else(|| DETACHED_HEAD.to_string()),
    }
}
