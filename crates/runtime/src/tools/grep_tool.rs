//! Grep Tool - 内容搜索
//!
//! Regex search over workspace files. Non-UTF-8 files are skipped, as are
//! `.git` and gitignored paths.

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::gitignore::walk_files;
use super::schema::{ToolSchema, ToolSchemaBuilder};
use super::{IgnoreMatcher, Tool, ToolContext, ToolEnv, ToolError, Workspace};

/// Longest line text returned per match
const MAX_LINE_CHARS: usize = 500;

fn default_path() -> String {
    ".".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchContentRequest {
    pub pattern: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
    #[serde(default)]
    pub case_insensitive: bool,
    pub max_results: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentMatch {
    pub path: String,
    /// 1-based
    pub line: u64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchContentResponse {
    pub matches: Vec<ContentMatch>,
    pub truncated: bool,
}

/// Grep tool - 内容搜索
pub struct SearchContentTool {
    workspace: Workspace,
    ignore: Arc<dyn IgnoreMatcher>,
    max_results: u64,
}

impl SearchContentTool {
    pub fn new(env: &ToolEnv) -> Self {
        Self {
            workspace: env.workspace.clone(),
            ignore: env.ignore.clone(),
            max_results: env.settings.max_results as u64,
        }
    }
}

/// `include` matches the file name or the workspace-relative path
pub(crate) fn glob_matches(pattern: &glob::Pattern, relative: &Path) -> bool {
    pattern.matches_path(relative)
        || relative
            .file_name()
            .is_some_and(|name| pattern.matches(&name.to_string_lossy()))
}

fn clip(line: &str) -> String {
    match line.char_indices().nth(MAX_LINE_CHARS) {
        Some((idx, _)) => format!("{}...", &line[..idx]),
        None => line.to_string(),
    }
}

struct Search {
    root: std::path::PathBuf,
    start: std::path::PathBuf,
    regex: Regex,
    include: Option<glob::Pattern>,
    limit: usize,
}

impl Search {
    fn run(
        &self,
        ignore: &dyn IgnoreMatcher,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> (Vec<ContentMatch>, bool) {
        let mut matches = Vec::new();
        let mut truncated = false;

        walk_files(&self.root, &self.start, ignore, |file| {
            if cancel.is_cancelled() {
                return false;
            }
            let relative = file.strip_prefix(&self.root).unwrap_or(file);
            if let Some(include) = &self.include
                && !glob_matches(include, relative)
            {
                return true;
            }
            let Ok(bytes) = std::fs::read(file) else {
                return true;
            };
            let Ok(text) = std::str::from_utf8(&bytes) else {
                return true;
            };

            for (idx, line) in text.lines().enumerate() {
                if !self.regex.is_match(line) {
                    continue;
                }
                if matches.len() == self.limit {
                    truncated = true;
                    return false;
                }
                matches.push(ContentMatch {
                    path: relative.to_string_lossy().into_owned(),
                    line: idx as u64 + 1,
                    text: clip(line),
                });
            }
            true
        });

        (matches, truncated)
    }
}

#[async_trait]
impl Tool for SearchContentTool {
    type Request = SearchContentRequest;
    type Response = SearchContentResponse;

    fn name(&self) -> &'static str {
        "search_content"
    }

    fn description(&self) -> &'static str {
        "Search file contents with a regular expression. Returns matching lines with their path and line number."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchemaBuilder::new()
            .required_string("pattern", "Regular expression to search for")
            .string_default("path", "File or directory to search, relative to the workspace root", ".")
            .param_string("include", "Only search files matching this glob, e.g. *.rs")
            .boolean_default("case_insensitive", "Ignore case", false)
            .integer_default("max_results", "Maximum number of matching lines", self.max_results)
            .build()
    }

    async fn run(
        &self,
        ctx: &ToolContext,
        request: SearchContentRequest,
    ) -> Result<SearchContentResponse, ToolError> {
        if request.max_results == 0 {
            return Err(ToolError::invalid("max_results", "must be at least 1"));
        }
        let regex = RegexBuilder::new(&request.pattern)
            .case_insensitive(request.case_insensitive)
            .build()
            .map_err(|e| ToolError::invalid("pattern", e.to_string()))?;
        let include = request
            .include
            .as_deref()
            .map(glob::Pattern::new)
            .transpose()
            .map_err(|e| ToolError::invalid("include", e.to_string()))?;
        let start = self.workspace.resolve(&request.path)?;
        if !start.exists() {
            return Err(ToolError::ExecutionFailed(format!(
                "{} does not exist",
                self.workspace.relative(&start)
            )));
        }

        let search = Search {
            root: self.workspace.root().to_path_buf(),
            start,
            regex,
            include,
            limit: request.max_results as usize,
        };
        let ignore = self.ignore.clone();
        let cancel = ctx.cancel.clone();
        let (matches, truncated) =
            tokio::task::spawn_blocking(move || search.run(ignore.as_ref(), &cancel))
                .await
                .map_err(|e| ToolError::ExecutionFailed(format!("search task failed: {}", e)))?;

        if ctx.cancel.is_cancelled() {
            return Err(ToolError::Cancelled("search cancelled".to_string()));
        }

        debug!(pattern = %request.pattern, matches = matches.len(), truncated, "content searched");
        Ok(SearchContentResponse { matches, truncated })
    }
}
