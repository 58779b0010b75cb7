//! List Tool - 列出目录内容
//!
//! Directories first, then files, each group sorted by name. `.git` and
//! gitignored entries are hidden.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

use super::schema::{ToolSchema, ToolSchemaBuilder};
use super::{IgnoreMatcher, Tool, ToolContext, ToolEnv, ToolError, Workspace};

fn default_path() -> String {
    ".".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListDirectoryRequest {
    #[serde(default = "default_path")]
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Dir,
    File,
    Symlink,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListDirectoryResponse {
    pub path: String,
    pub entries: Vec<DirEntry>,
}

/// List tool - 列出目录内容
pub struct ListDirectoryTool {
    workspace: Workspace,
    ignore: Arc<dyn IgnoreMatcher>,
}

impl ListDirectoryTool {
    pub fn new(env: &ToolEnv) -> Self {
        Self {
            workspace: env.workspace.clone(),
            ignore: env.ignore.clone(),
        }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    type Request = ListDirectoryRequest;
    type Response = ListDirectoryResponse;

    fn name(&self) -> &'static str {
        "list_directory"
    }

    fn description(&self) -> &'static str {
        "List the entries of a directory in the workspace. Directories come first; gitignored paths are hidden."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchemaBuilder::new()
            .string_default("path", "Directory path, relative to the workspace root", ".")
            .build()
    }

    async fn run(
        &self,
        _ctx: &ToolContext,
        request: ListDirectoryRequest,
    ) -> Result<ListDirectoryResponse, ToolError> {
        let dir = self.workspace.resolve(&request.path)?;
        let shown = self.workspace.relative(&dir);
        if !dir.is_dir() {
            return Err(ToolError::ExecutionFailed(format!("{} is not a directory", shown)));
        }

        let mut entries = Vec::new();
        let mut reader = fs::read_dir(&dir).await?;
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == ".git" {
                continue;
            }
            let path = entry.path();
            let meta = fs::symlink_metadata(&path).await?;
            let file_type = meta.file_type();

            let relative = path.strip_prefix(self.workspace.root()).unwrap_or(&path);
            if self.ignore.should_ignore(relative, file_type.is_dir()) {
                continue;
            }

            let (kind, target) = if file_type.is_symlink() {
                let target = fs::read_link(&path)
                    .await
                    .ok()
                    .map(|t| t.to_string_lossy().into_owned());
                (EntryKind::Symlink, target)
            } else if file_type.is_dir() {
                (EntryKind::Dir, None)
            } else {
                (EntryKind::File, None)
            };

            entries.push(DirEntry {
                name,
                kind,
                size: if kind == EntryKind::File { meta.len() } else { 0 },
                target,
            });
        }

        entries.sort_by(|a, b| {
            (a.kind != EntryKind::Dir, &a.name).cmp(&(b.kind != EntryKind::Dir, &b.name))
        });

        debug!(path = %shown, count = entries.len(), "directory listed");

        Ok(ListDirectoryResponse {
            path: shown,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::env;
    use tempfile::TempDir;

    fn names(response: &ListDirectoryResponse) -> Vec<&str> {
        response.entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_list_directory_dirs_first() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("b.txt"), "bb").unwrap();
        std::fs::write(temp_dir.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(temp_dir.path().join("zdir")).unwrap();
        let tool = ListDirectoryTool::new(&env(&temp_dir));

        let result = tool
            .run(&ToolContext::default(), ListDirectoryRequest { path: ".".to_string() })
            .await
            .unwrap();
        assert_eq!(result.path, ".");
        assert_eq!(names(&result), vec!["zdir", "a.txt", "b.txt"]);
        assert_eq!(result.entries[0].kind, EntryKind::Dir);
        assert_eq!(result.entries[2].size, 2);
    }

    #[tokio::test]
    async fn test_list_hides_git_and_ignored() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join(".git")).unwrap();
        std::fs::create_dir(temp_dir.path().join("target")).unwrap();
        std::fs::write(temp_dir.path().join(".gitignore"), "target/\n").unwrap();
        std::fs::write(temp_dir.path().join("main.rs"), "").unwrap();
        // gitignore is loaded when the env is built
        let tool = ListDirectoryTool::new(&env(&temp_dir));

        let result = tool
            .run(&ToolContext::default(), ListDirectoryRequest { path: ".".to_string() })
            .await
            .unwrap();
        assert_eq!(names(&result), vec![".gitignore", "main.rs"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_reports_target() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("real.txt"), "x").unwrap();
        std::os::unix::fs::symlink("real.txt", temp_dir.path().join("link.txt")).unwrap();
        let tool = ListDirectoryTool::new(&env(&temp_dir));

        let result = tool
            .run(&ToolContext::default(), ListDirectoryRequest { path: ".".to_string() })
            .await
            .unwrap();
        let link = result.entries.iter().find(|e| e.name == "link.txt").unwrap();
        assert_eq!(link.kind, EntryKind::Symlink);
        assert_eq!(link.target.as_deref(), Some("real.txt"));
    }

    #[tokio::test]
    async fn test_list_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("a.txt"), "a").unwrap();
        let tool = ListDirectoryTool::new(&env(&temp_dir));

        let err = tool
            .run(&ToolContext::default(), ListDirectoryRequest { path: "a.txt".to_string() })
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
    }
}
