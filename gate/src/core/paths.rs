//! Lexical path helpers for project-relative checks.

use std::path::{Component, Path, PathBuf};

/// Resolve `.` and `..` components without touching the filesystem.
///
/// `..` at the root is dropped, matching how the kernel resolves `/..`.
pub fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::ParentDir) | None if !path.has_root() => out.push(".."),
                _ => {}
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Project-relative form of `path`, or `None` when it lies outside `root`.
pub fn relative_to<'a>(path: &'a Path, root: &Path) -> Option<&'a Path> {
    path.strip_prefix(root).ok()
}

/// True when the project-relative path sits under one of the work-artifact
/// directories (entries such as `"sessions/"` or `"docs"`).
pub fn is_work_artifact(rel: &Path, directories: &[String]) -> bool {
    directories.iter().any(|dir| {
        let dir = Path::new(dir.trim().trim_end_matches('/'));
        !dir.as_os_str().is_empty() && rel.starts_with(dir) && rel != dir
    })
}

/// True when `path` is `dir` or inside it (component-wise).
pub fn is_within(path: &Path, dir: &Path) -> bool {
    path.starts_with(dir)
}
