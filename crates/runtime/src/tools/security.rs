//! Workspace boundary guard
//!
//! Every path-accepting tool resolves its arguments through [`Workspace::resolve`]:
//! - `~` expands to the user's home directory
//! - relative paths join the workspace root
//! - `..` is resolved logically before touching the filesystem
//! - symlinks are resolved through the longest existing ancestor
//!
//! Anything that does not land under the canonical root is rejected.

use std::path::{Component, Path, PathBuf};

use super::ToolError;

/// 工作区根目录 (启动时确定一次)
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ToolError> {
        let path = expand_home(path.as_ref());
        let root = std::fs::canonicalize(&path)?;
        if !root.is_dir() {
            return Err(ToolError::ExecutionFailed(format!(
                "workspace root is not a directory: {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a tool path argument to an absolute path inside the workspace
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, ToolError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ToolError::invalid("path", "must not be empty"));
        }

        let expanded = expand_home(Path::new(raw));
        let absolute = if expanded.is_absolute() {
            expanded
        } else {
            self.root.join(expanded)
        };
        let normalized = normalize_path(&absolute);
        let resolved = canonicalize_lossy(&normalized);

        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(ToolError::OutsideWorkspace(normalized))
        }
    }

    /// True if `raw` resolves inside the workspace
    pub fn contains(&self, raw: &str) -> bool {
        self.resolve(raw).is_ok()
    }

    /// Path relative to the root, for display
    pub fn relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.to_string_lossy().into_owned(),
            Err(_) => path.to_string_lossy().into_owned(),
        }
    }
}

fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Resolve `.` and `..` purely logically (no filesystem access)
fn normalize_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = parts.last() {
                    parts.pop();
                } else if !matches!(parts.last(), Some(Component::RootDir)) {
                    parts.push(component);
                }
            }
            Component::CurDir => {}
            _ => parts.push(component),
        }
    }
    parts.iter().collect()
}

/// Canonicalize the longest existing ancestor and re-append the rest
fn canonicalize_lossy(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }

    let mut missing = Vec::new();
    let mut current = path;
    while let Some(parent) = current.parent() {
        if let Some(name) = current.file_name() {
            missing.push(name.to_os_string());
        }
        if let Ok(canonical) = std::fs::canonicalize(parent) {
            return missing
                .iter()
                .rev()
                .fold(canonical, |acc, part| acc.join(part));
        }
        current = parent;
    }

    path.to_path_buf()
}
