//! Write Tool - 写入文件 (原子写入)
//!
//! Sequence under the per-path lock: verify stored digest against the
//! current content, atomic write, record the new digest.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::fs;
use tracing::info;

use super::atomic::{DEFAULT_FILE_MODE, existing_mode};
use super::schema::{ToolSchema, ToolSchemaBuilder};
use super::{AtomicWriter, ChecksumStore, Tool, ToolContext, ToolEnv, ToolError, Workspace};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteFileRequest {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WriteFileResponse {
    pub path: String,
    pub bytes_written: u64,
    pub created: bool,
}

/// Write tool - 创建或覆盖文件
#[derive(Debug)]
pub struct WriteFileTool {
    workspace: Workspace,
    checksums: Arc<ChecksumStore>,
    writer: AtomicWriter,
}

impl WriteFileTool {
    pub fn new(env: &ToolEnv) -> Self {
        Self {
            workspace: env.workspace.clone(),
            checksums: env.checksums.clone(),
            writer: env.writer.clone(),
        }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    type Request = WriteFileRequest;
    type Response = WriteFileResponse;

    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Create or overwrite a file in the workspace with the given content. Parent directories are created as needed."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchemaBuilder::new()
            .required_string("path", "File path, relative to the workspace root")
            .required_string("content", "Complete new file content")
            .build()
    }

    async fn run(
        &self,
        _ctx: &ToolContext,
        request: WriteFileRequest,
    ) -> Result<WriteFileResponse, ToolError> {
        let path = self.workspace.resolve(&request.path)?;
        let shown = self.workspace.relative(&path);
        if path.is_dir() {
            return Err(ToolError::ExecutionFailed(format!("{} is a directory", shown)));
        }

        let _guard = self.checksums.lock_path(&path).await;

        let created = match fs::read(&path).await {
            Ok(current) => {
                self.checksums.verify(&path, &current)?;
                false
            }
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mode = if created { DEFAULT_FILE_MODE } else { existing_mode(&path) };
        let content = request.content.into_bytes();
        let bytes_written = content.len() as u64;
        self.writer.write_file(path.clone(), content.clone(), mode).await?;
        self.checksums.record(&path, &content);

        info!(path = %shown, bytes = bytes_written, created, "file written");

        Ok(WriteFileResponse {
            path: shown,
            bytes_written,
            created,
        })
    }
}
