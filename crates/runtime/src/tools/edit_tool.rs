//! Edit Tool - 精确文本替换
//!
//! `old_text` must match exactly. Several matches are refused unless
//! `replace_all` is set, so an edit never lands somewhere unintended.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::fs;
use tracing::info;

use super::atomic::existing_mode;
use super::schema::{ToolSchema, ToolSchemaBuilder};
use super::{AtomicWriter, ChecksumStore, Tool, ToolContext, ToolEnv, ToolError, Workspace};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditFileRequest {
    pub path: String,
    pub old_text: String,
    pub new_text: String,
    #[serde(default)]
    pub replace_all: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditFileResponse {
    pub path: String,
    pub replacements: u64,
}

/// Edit tool - 编辑文件
#[derive(Debug)]
pub struct EditFileTool {
    workspace: Workspace,
    checksums: Arc<ChecksumStore>,
    writer: AtomicWriter,
}

impl EditFileTool {
    pub fn new(env: &ToolEnv) -> Self {
        Self {
            workspace: env.workspace.clone(),
            checksums: env.checksums.clone(),
            writer: env.writer.clone(),
        }
    }
}

/// Apply the replacement, returning the new text and the match count
fn replace(content: &str, old: &str, new: &str, replace_all: bool) -> Result<(String, usize), String> {
    match content.matches(old).count() {
        0 => Err("old_text not found in file".to_string()),
        1 => Ok((content.replacen(old, new, 1), 1)),
        n if replace_all => Ok((content.replace(old, new), n)),
        n => Err(format!(
            "old_text matches {} times; include more context or set replace_all",
            n
        )),
    }
}

#[async_trait]
impl Tool for EditFileTool {
    type Request = EditFileRequest;
    type Response = EditFileResponse;

    fn name(&self) -> &'static str {
        "edit_file"
    }

    fn description(&self) -> &'static str {
        "Replace exact text in an existing file. old_text must match exactly once unless replace_all is true."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchemaBuilder::new()
            .required_string("path", "File path, relative to the workspace root")
            .required_string("old_text", "Exact text to replace")
            .required_string("new_text", "Replacement text")
            .boolean_default("replace_all", "Replace every occurrence", false)
            .build()
    }

    async fn run(
        &self,
        _ctx: &ToolContext,
        request: EditFileRequest,
    ) -> Result<EditFileResponse, ToolError> {
        if request.old_text.is_empty() {
            return Err(ToolError::invalid("old_text", "must not be empty"));
        }
        if request.old_text == request.new_text {
            return Err(ToolError::invalid("new_text", "must differ from old_text"));
        }

        let path = self.workspace.resolve(&request.path)?;
        let shown = self.workspace.relative(&path);

        let _guard = self.checksums.lock_path(&path).await;

        let current = fs::read(&path).await?;
        self.checksums.verify(&path, &current)?;
        let text = String::from_utf8(current).map_err(|_| {
            ToolError::ExecutionFailed(format!("{} is not a UTF-8 text file", shown))
        })?;

        let (updated, count) = replace(&text, &request.old_text, &request.new_text, request.replace_all)
            .map_err(|reason| ToolError::ExecutionFailed(format!("{}: {}", shown, reason)))?;

        let content = updated.into_bytes();
        self.writer
            .write_file(path.clone(), content.clone(), existing_mode(&path))
            .await?;
        self.checksums.record(&path, &content);

        info!(path = %shown, replacements = count, "file edited");

        Ok(EditFileResponse {
            path: shown,
            replacements: count as u64,
        })
    }
}
