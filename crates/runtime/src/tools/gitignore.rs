//! Gitignore service + workspace walker
//!
//! Loading never blocks tool availability: when the ignore files cannot be
//! parsed the service falls back to [`NoIgnore`].

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Decides whether a workspace-relative path is hidden from search tools
pub trait IgnoreMatcher: Send + Sync {
    fn should_ignore(&self, relative: &Path, is_dir: bool) -> bool;
}

/// Fallback matcher, ignores nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIgnore;

impl IgnoreMatcher for NoIgnore {
    fn should_ignore(&self, _relative: &Path, _is_dir: bool) -> bool {
        false
    }
}

#[derive(Debug)]
pub struct GitignoreMatcher {
    inner: Gitignore,
}

impl IgnoreMatcher for GitignoreMatcher {
    fn should_ignore(&self, relative: &Path, is_dir: bool) -> bool {
        self.inner
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
    }
}

/// Root `.gitignore` plus `.git/info/exclude`
pub fn load_gitignore(root: &Path) -> Arc<dyn IgnoreMatcher> {
    let mut builder = GitignoreBuilder::new(root);

    for file in [root.join(".git/info/exclude"), root.join(".gitignore")] {
        if !file.is_file() {
            continue;
        }
        if let Some(e) = builder.add(&file) {
            warn!(path = %file.display(), error = %e, "ignoring unreadable gitignore file");
        }
    }

    match builder.build() {
        Ok(inner) => {
            debug!(rules = inner.num_ignores(), "gitignore loaded");
            Arc::new(GitignoreMatcher { inner })
        }
        Err(e) => {
            warn!(error = %e, "gitignore unavailable, nothing will be ignored");
            Arc::new(NoIgnore)
        }
    }
}

/// Depth-first walk over regular files under `start`, sorted per directory.
///
/// Skips `.git`, symlinks and ignored paths. `visit` receives the absolute
/// path and returns `false` to stop early.
pub fn walk_files<F>(root: &Path, start: &Path, matcher: &dyn IgnoreMatcher, mut visit: F)
where
    F: FnMut(&Path) -> bool,
{
    if start.is_file() {
        visit(start);
        return;
    }

    let mut stack: Vec<PathBuf> = vec![start.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut entries: Vec<_> = match std::fs::read_dir(&dir) {
            Ok(entries) => entries.filter_map(Result::ok).collect(),
            Err(e) => {
                debug!(path = %dir.display(), error = %e, "skipping unreadable directory");
                continue;
            }
        };
        entries.sort_by_key(|entry| entry.file_name());

        let mut subdirs = Vec::new();
        for entry in entries {
            if entry.file_name() == ".git" {
                continue;
            }
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_symlink() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(&path);
            if matcher.should_ignore(relative, file_type.is_dir()) {
                continue;
            }
            if file_type.is_dir() {
                subdirs.push(path);
            } else if !visit(&path) {
                return;
            }
        }
        // reversed so the first subdirectory is walked first
        stack.extend(subdirs.into_iter().rev());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("src/nested")).unwrap();
        std::fs::create_dir_all(root.join("target/debug")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join(".gitignore"), "target/\n*.log\n").unwrap();
        std::fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();
        std::fs::write(root.join("src/nested/lib.rs"), "").unwrap();
        std::fs::write(root.join("build.log"), "noise").unwrap();
        std::fs::write(root.join("target/debug/out"), "bin").unwrap();
        std::fs::write(root.join(".git/HEAD"), "ref").unwrap();
        temp_dir
    }

    fn collect(root: &Path, matcher: &dyn IgnoreMatcher) -> Vec<String> {
        let mut seen = Vec::new();
        walk_files(root, root, matcher, |path| {
            seen.push(path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"));
            true
        });
        seen
    }

    #[test]
    fn test_gitignore_rules_apply() {
        let temp_dir = fixture();
        let matcher = load_gitignore(temp_dir.path());

        assert!(matcher.should_ignore(Path::new("build.log"), false));
        assert!(matcher.should_ignore(Path::new("target"), true));
        assert!(matcher.should_ignore(Path::new("target/debug/out"), false));
        assert!(!matcher.should_ignore(Path::new("src/main.rs"), false));
    }

    #[test]
    fn test_walk_skips_git_and_ignored() {
        let temp_dir = fixture();
        let matcher = load_gitignore(temp_dir.path());

        let files = collect(temp_dir.path(), matcher.as_ref());
        assert_eq!(files, vec![".gitignore", "src/main.rs", "src/nested/lib.rs"]);
    }

    #[test]
    fn test_no_ignore_fallback_sees_everything_but_git() {
        let temp_dir = fixture();
        let files = collect(temp_dir.path(), &NoIgnore);
        assert!(files.contains(&"build.log".to_string()));
        assert!(files.contains(&"target/debug/out".to_string()));
        assert!(!files.iter().any(|f| f.starts_with(".git/")));
    }

    #[test]
    fn test_walk_stops_early() {
        let temp_dir = fixture();
        let mut count = 0;
        walk_files(temp_dir.path(), temp_dir.path(), &NoIgnore, |_| {
            count += 1;
            count < 2
        });
        assert_eq!(count, 2);
    }

    #[test]
    fn test_missing_gitignore_loads_empty_matcher() {
        let temp_dir = TempDir::new().unwrap();
        let matcher = load_gitignore(temp_dir.path());
        assert!(!matcher.should_ignore(Path::new("anything.txt"), false));
    }
}
