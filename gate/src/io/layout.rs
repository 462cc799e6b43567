//! Canonical paths under a project root.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::paths::{normalize_lexical, relative_to};

/// File name of the protected session state document.
pub const STATE_FILE_NAME: &str = "sessions-state.json";

/// All canonical gate paths for a project root.
#[derive(Debug, Clone)]
pub struct GatePaths {
    pub root: PathBuf,
    pub sessions_dir: PathBuf,
    pub state_path: PathBuf,
    pub events_path: PathBuf,
    pub config_path: PathBuf,
    /// Reserved state storage that delegated sub-tasks may not touch.
    pub reserved_state_dir: PathBuf,
    pub subagents_path: PathBuf,
}

impl GatePaths {
    /// Build paths for `root`, canonicalizing it when it exists.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = fs::canonicalize(&root).unwrap_or(root);
        let sessions_dir = root.join("sessions");
        let reserved_state_dir = root.join(".claude").join("state");
        Self {
            root: root.clone(),
            sessions_dir: sessions_dir.clone(),
            state_path: sessions_dir.join(STATE_FILE_NAME),
            events_path: sessions_dir.join("sessions-events.jsonl"),
            config_path: sessions_dir.join("sessions-config.toml"),
            subagents_path: reserved_state_dir.join("subagents.json"),
            reserved_state_dir,
        }
    }

    /// Resolve a tool-supplied path to an absolute, symlink-resolved form.
    ///
    /// Relative paths are taken from the project root. `..` is handled
    /// lexically first, then the longest existing ancestor is canonicalized so
    /// symlinked directories cannot hide the real target.
    pub fn resolve(&self, raw: &Path) -> PathBuf {
        let joined = if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            self.root.join(raw)
        };
        canonicalize_existing_prefix(&normalize_lexical(&joined))
    }

    /// Project-relative form of an already resolved path.
    pub fn relative(&self, resolved: &Path) -> Option<PathBuf> {
        relative_to(resolved, &self.root).map(Path::to_path_buf)
    }
}

fn canonicalize_existing_prefix(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut tail: Vec<OsString> = Vec::new();
    loop {
        if let Ok(mut resolved) = fs::canonicalize(existing) {
            for part in tail.iter().rev() {
                resolved.push(part);
            }
            return resolved;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

/// Pick the project root.
///
/// Order: explicit `--root`, then `CLAUDE_PROJECT_DIR`, then the nearest
/// ancestor of `cwd` holding `sessions/` or `.claude/`, then `cwd` itself.
pub fn discover_root(explicit: Option<&Path>, env_dir: Option<&Path>, cwd: &Path) -> PathBuf {
    if let Some(root) = explicit.or(env_dir) {
        return root.to_path_buf();
    }
    let found = cwd
        .ancestors()
        .find(|dir| dir.join("sessions").is_dir() || dir.join(".claude").is_dir());
    debug!(cwd = %cwd.display(), found = ?found, "discovered project root");
    found.unwrap_or(cwd).to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestProject;

    #[test]
    fn paths_live_under_sessions_and_claude_state() {
        let project = TestProject::new();
        let paths = GatePaths::new(project.root());
        assert_eq!(paths.state_path, project.root().join("sessions/sessions-state.json"));
        assert_eq!(
            paths.subagents_path,
            project.root().join(".claude/state/subagents.json")
        );
    }

    #[test]
    fn resolve_handles_relative_and_parent_components() {
        let project = TestProject::new();
        let paths = GatePaths::new(project.root());
        assert_eq!(
            paths.resolve(Path::new("src/../sessions/notes.md")),
            project.root().join("sessions/notes.md")
        );
        assert_eq!(
            paths.relative(&paths.resolve(Path::new("missing/dir/file.rs"))),
            Some(PathBuf::from("missing/dir/file.rs"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn resolve_follows_symlinked_directories() {
        let project = TestProject::new();
        fs::create_dir_all(project.root().join(".claude/state")).expect("mkdir");
        std::os::unix::fs::symlink(
            project.root().join(".claude/state"),
            project.root().join("docs"),
        )
        .expect("symlink");
        let paths = GatePaths::new(project.root());
        assert_eq!(
            paths.resolve(Path::new("docs/new.json")),
            project.root().join(".claude/state/new.json")
        );
    }

    #[test]
    fn discover_prefers_explicit_then_markers() {
        let project = TestProject::new();
        let nested = project.root().join("a/b");
        fs::create_dir_all(&nested).expect("mkdir");

        assert_eq!(
            discover_root(Some(Path::new("/explicit")), None, &nested),
            PathBuf::from("/explicit")
        );
        assert_eq!(discover_root(None, None, &nested), project.root());
    }
}
