//! Glob Tool - 文件查找
//!
//! A pattern is tried against the workspace-relative path and the bare file
//! name, so both `src/**/*.rs` and `*.rs` work.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::gitignore::walk_files;
use super::grep_tool::glob_matches;
use super::schema::{ToolSchema, ToolSchemaBuilder};
use super::{IgnoreMatcher, Tool, ToolContext, ToolEnv, ToolError, Workspace};

fn default_path() -> String {
    ".".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindFileRequest {
    pub pattern: String,
    #[serde(default = "default_path")]
    pub path: String,
    pub max_results: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FindFileResponse {
    pub matches: Vec<String>,
    pub truncated: bool,
}

/// Glob tool - 按模式查找文件
pub struct FindFileTool {
    workspace: Workspace,
    ignore: Arc<dyn IgnoreMatcher>,
    max_results: u64,
}

impl FindFileTool {
    pub fn new(env: &ToolEnv) -> Self {
        Self {
            workspace: env.workspace.clone(),
            ignore: env.ignore.clone(),
            max_results: env.settings.max_results as u64,
        }
    }
}

#[async_trait]
impl Tool for FindFileTool {
    type Request = FindFileRequest;
    type Response = FindFileResponse;

    fn name(&self) -> &'static str {
        "find_file"
    }

    fn description(&self) -> &'static str {
        "Find files whose path or name matches a glob pattern such as *.rs or src/**/mod.rs."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchemaBuilder::new()
            .required_string("pattern", "Glob pattern")
            .string_default("path", "Directory to search, relative to the workspace root", ".")
            .integer_default("max_results", "Maximum number of paths", self.max_results)
            .build()
    }

    async fn run(
        &self,
        ctx: &ToolContext,
        request: FindFileRequest,
    ) -> Result<FindFileResponse, ToolError> {
        if request.max_results == 0 {
            return Err(ToolError::invalid("max_results", "must be at least 1"));
        }
        let pattern = glob::Pattern::new(&request.pattern)
            .map_err(|e| ToolError::invalid("pattern", e.to_string()))?;
        let start = self.workspace.resolve(&request.path)?;
        if !start.is_dir() {
            return Err(ToolError::ExecutionFailed(format!(
                "{} is not a directory",
                self.workspace.relative(&start)
            )));
        }

        let root = self.workspace.root().to_path_buf();
        let ignore = self.ignore.clone();
        let cancel = ctx.cancel.clone();
        let limit = request.max_results as usize;

        let (matches, truncated) = tokio::task::spawn_blocking(move || {
            let mut matches = Vec::new();
            let mut truncated = false;
            walk_files(&root, &start, ignore.as_ref(), |file| {
                if cancel.is_cancelled() {
                    return false;
                }
                let relative = file.strip_prefix(&root).unwrap_or(file);
                if !glob_matches(&pattern, relative) {
                    return true;
                }
                if matches.len() == limit {
                    truncated = true;
                    return false;
                }
                matches.push(relative.to_string_lossy().into_owned());
                true
            });
            (matches, truncated)
        })
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("find task failed: {}", e)))?;

        if ctx.cancel.is_cancelled() {
            return Err(ToolError::Cancelled("find cancelled".to_string()));
        }

        debug!(pattern = %request.pattern, matches = matches.len(), truncated, "files found");
        Ok(FindFileResponse { matches, truncated })
    }
}
