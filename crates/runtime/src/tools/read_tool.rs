//! Read Tool - 读取文件 (支持 offset/limit)
//!
//! The digest of the whole file is recorded on every successful read,
//! whatever slice is returned, so later edits can detect concurrent changes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

use super::schema::{ToolSchema, ToolSchemaBuilder};
use super::{ChecksumStore, Tool, ToolContext, ToolEnv, ToolError, Workspace};

const DEFAULT_LIMIT: u64 = 2000;

fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadFileRequest {
    pub path: String,
    /// 0-based line offset
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadFileResponse {
    pub path: String,
    pub content: String,
    /// 1-based number of the first returned line
    pub start_line: u64,
    pub lines_returned: u64,
    pub total_lines: u64,
    pub truncated: bool,
}

/// Read tool - 读取文件内容
#[derive(Debug)]
pub struct ReadFileTool {
    workspace: Workspace,
    checksums: Arc<ChecksumStore>,
}

impl ReadFileTool {
    pub fn new(env: &ToolEnv) -> Self {
        Self {
            workspace: env.workspace.clone(),
            checksums: env.checksums.clone(),
        }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    type Request = ReadFileRequest;
    type Response = ReadFileResponse;

    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read a UTF-8 text file in the workspace. Use offset (0-based line) and limit for large files."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchemaBuilder::new()
            .required_string("path", "File path, relative to the workspace root")
            .integer_default("offset", "Number of lines to skip", 0)
            .integer_default("limit", "Maximum number of lines to return", DEFAULT_LIMIT)
            .build()
    }

    async fn run(
        &self,
        _ctx: &ToolContext,
        request: ReadFileRequest,
    ) -> Result<ReadFileResponse, ToolError> {
        let path = self.workspace.resolve(&request.path)?;
        let shown = self.workspace.relative(&path);
        if path.is_dir() {
            return Err(ToolError::ExecutionFailed(format!(
                "{} is a directory, use list_directory",
                shown
            )));
        }

        let bytes = fs::read(&path).await?;
        let text = std::str::from_utf8(&bytes).map_err(|_| {
            ToolError::ExecutionFailed(format!("{} is not a UTF-8 text file", shown))
        })?;
        self.checksums.record(&path, &bytes);

        let lines: Vec<&str> = text.lines().collect();
        let total = lines.len();
        let start = (request.offset as usize).min(total);
        let end = start.saturating_add(request.limit as usize).min(total);

        debug!(path = %shown, start, end, total, "file read");

        Ok(ReadFileResponse {
            path: shown,
            content: lines[start..end].join("\n"),
            start_line: start as u64 + 1,
            lines_returned: (end - start) as u64,
            total_lines: total as u64,
            truncated: end < total,
        })
    }
}
