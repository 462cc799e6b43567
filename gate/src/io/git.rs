//! Git adapter for the branch consistency check.
//!
//! Only two things are needed from git: which repository owns a file, and
//! which branch that repository has checked out. The branch query is the one
//! call in a hook that can stall, so it runs under a timeout.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::core::branch::RepoObservation;
use crate::io::process::run_with_timeout;

const OUTPUT_LIMIT_BYTES: usize = 4096;

/// Result of asking a repository for its checked-out branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchQuery {
    Branch(String),
    Detached,
    /// Timeout, spawn failure or non-zero exit. Callers fail open.
    Unavailable(String),
}

pub trait BranchProbe {
    fn current_branch(&self, repo: &Path) -> BranchQuery;
}

/// `git branch --show-current` with a timeout.
#[derive(Debug, Clone)]
pub struct GitBranchProbe {
    timeout: Duration,
}

impl GitBranchProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl BranchProbe for GitBranchProbe {
    #[instrument(skip_all, fields(repo = %repo.display()))]
    fn current_branch(&self, repo: &Path) -> BranchQuery {
        let mut cmd = Command::new("git");
        cmd.args(["branch", "--show-current"]).current_dir(repo);

        let output = match run_with_timeout(cmd, self.timeout, OUTPUT_LIMIT_BYTES) {
            Ok(output) => output,
            Err(err) => return BranchQuery::Unavailable(format!("{err:#}")),
        };
        if output.timed_out() {
            return BranchQuery::Unavailable(format!(
                "git branch timed out after {} ms",
                self.timeout.as_millis()
            ));
        }
        if !output.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return BranchQuery::Unavailable(format!("git branch failed: {}", stderr.trim()));
        }

        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(branch = %name, "current branch");
        if name.is_empty() {
            BranchQuery::Detached
        } else {
            BranchQuery::Branch(name)
        }
    }
}

/// Nearest ancestor directory of `file` holding a `.git` entry (directory
/// for a normal repository, file for a submodule or worktree).
pub fn find_repo_root(file: &Path) -> Option<PathBuf> {
    file.parent()?
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}

/// What the branch check learned about the repository owning a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoLookup {
    /// The file is not inside any repository.
    NoRepo,
    /// A repository exists but its branch could not be determined.
    Unavailable { repo: PathBuf, reason: String },
    Observed(RepoObservation),
}

/// Locate and query the repository owning `file` (an absolute, resolved path).
///
/// Repositories enclosing the project root from outside are ignored.
pub fn observe_repo(project_root: &Path, file: &Path, probe: &dyn BranchProbe) -> RepoLookup {
    let Some(repo) = find_repo_root(file).filter(|repo| repo.starts_with(project_root)) else {
        debug!(file = %file.display(), "file is not inside a project repository");
        return RepoLookup::NoRepo;
    };

    let branch = match probe.current_branch(&repo) {
        BranchQuery::Branch(name) => Some(name),
        BranchQuery::Detached => None,
        BranchQuery::Unavailable(reason) => {
            warn!(repo = %repo.display(), %reason, "branch unavailable, skipping branch check");
            return RepoLookup::Unavailable { repo, reason };
        }
    };

    let is_root = repo == project_root;
    let rel_path = match repo.strip_prefix(project_root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.display().to_string(),
        _ => ".".to_string(),
    };
    let name = repo
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| repo.display().to_string());

    RepoLookup::Observed(RepoObservation {
        name,
        rel_path,
        is_root,
        branch,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::test_support::{TestProject, git_init};

    struct FixedProbe(BranchQuery);

    impl BranchProbe for FixedProbe {
        fn current_branch(&self, _repo: &Path) -> BranchQuery {
            self.0.clone()
        }
    }

    #[test]
    fn finds_nearest_repo_including_gitlink_files() {
        let project = TestProject::new();
        fs::create_dir_all(project.root().join(".git")).expect("mkdir");
        fs::create_dir_all(project.root().join("svcA/src")).expect("mkdir");
        fs::write(project.root().join("svcA/.git"), "gitdir: ../.git/modules/svcA\n")
            .expect("write gitlink");

        assert_eq!(
            find_repo_root(&project.root().join("svcA/src/lib.rs")),
            Some(project.root().join("svcA"))
        );
        assert_eq!(
            find_repo_root(&project.root().join("src/app.py")),
            Some(project.root().to_path_buf())
        );
    }

    #[test]
    fn observation_marks_root_and_relative_path() {
        let project = TestProject::new();
        fs::create_dir_all(project.root().join(".git")).expect("mkdir");
        fs::create_dir_all(project.root().join("svcA/.git")).expect("mkdir");
        let probe = FixedProbe(BranchQuery::Branch("main".to_string()));

        match observe_repo(project.root(), &project.root().join("svcA/x.rs"), &probe) {
            RepoLookup::Observed(obs) => {
                assert!(!obs.is_root);
                assert_eq!(obs.name, "svcA");
                assert_eq!(obs.rel_path, "svcA");
                assert_eq!(obs.branch.as_deref(), Some("main"));
            }
            other => panic!("expected observation, got {other:?}"),
        }
        match observe_repo(project.root(), &project.root().join("x.rs"), &probe) {
            RepoLookup::Observed(obs) => {
                assert!(obs.is_root);
                assert_eq!(obs.rel_path, ".");
            }
            other => panic!("expected observation, got {other:?}"),
        }
    }

    #[test]
    fn repositories_above_the_project_are_ignored() {
        let project = TestProject::new();
        fs::create_dir_all(project.root().join(".git")).expect("mkdir");
        let inner = project.root().join("workspace");
        fs::create_dir_all(&inner).expect("mkdir");
        let probe = FixedProbe(BranchQuery::Branch("main".to_string()));
        assert_eq!(
            observe_repo(&inner, &inner.join("src/a.rs"), &probe),
            RepoLookup::NoRepo
        );
    }

    #[test]
    fn unavailable_branch_is_reported() {
        let project = TestProject::new();
        fs::create_dir_all(project.root().join(".git")).expect("mkdir");
        let probe = FixedProbe(BranchQuery::Unavailable("boom".to_string()));
        assert!(matches!(
            observe_repo(project.root(), &project.root().join("a.rs"), &probe),
            RepoLookup::Unavailable { .. }
        ));
    }

    #[test]
    fn git_probe_reads_real_branch() {
        let project = TestProject::new();
        git_init(project.root(), "feature/x");
        let probe = GitBranchProbe::new(Duration::from_secs(5));
        assert_eq!(
            probe.current_branch(project.root()),
            BranchQuery::Branch("feature/x".to_string())
        );
    }
}
