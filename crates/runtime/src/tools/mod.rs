//! Tools - 受控工具集
//!
//! 职责：
//! - 工作区内的文件读写与编辑 (摘要校验 + 原子写入)
//! - 目录列举、内容搜索、文件查找 (遵循 .gitignore)
//! - Shell 命令执行 (超时 + 取消)
//! - 会话内任务列表
//!
//! 所有路径参数都经过 [`Workspace`] 校验。

pub use helm_core::ToolError;

pub mod atomic;
pub mod checksum;
pub mod gitignore;
pub mod registry;
pub mod schema;
pub mod security;
mod trait_mod;

pub mod edit_tool;
pub mod glob_tool;
pub mod grep_tool;
pub mod list_tool;
pub mod read_tool;
pub mod shell;
pub mod todo_tool;
pub mod write_tool;

pub use atomic::{AtomicWriteError, AtomicWriter, OsWriteOps, WriteOps, WriteStage};
pub use checksum::{ChecksumStore, PathGuard};
pub use gitignore::{IgnoreMatcher, NoIgnore, load_gitignore};
pub use registry::{RegistryError, ToolAdapter};
pub use schema::{ArgSpec, ArgType, ToolSchema, ToolSchemaBuilder};
pub use security::Workspace;
pub use shell::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
pub use todo_tool::{TodoItem, TodoList, TodoStatus};
pub use trait_mod::{DynTool, Tool, ToolContext, decode_request, encode_request, erase};

use helm_core::ToolSettings;
use std::fmt;
use std::sync::Arc;

/// Names of the built-in tools, in the order they are offered to the model
pub const BUILTIN_TOOLS: [&str; 9] = [
    "read_file",
    "write_file",
    "edit_file",
    "list_directory",
    "run_shell",
    "search_content",
    "find_file",
    "read_todos",
    "write_todos",
];

/// Shared services the built-in tools are constructed from
#[derive(Clone)]
pub struct ToolEnv {
    pub workspace: Workspace,
    pub checksums: Arc<ChecksumStore>,
    pub writer: AtomicWriter,
    pub ignore: Arc<dyn IgnoreMatcher>,
    pub runner: Arc<dyn CommandRunner>,
    pub todos: Arc<TodoList>,
    pub settings: ToolSettings,
}

impl fmt::Debug for ToolEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolEnv")
            .field("workspace", &self.workspace)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ToolEnv {
    pub fn new(workspace: Workspace, settings: ToolSettings) -> Self {
        let ignore = load_gitignore(workspace.root());
        Self {
            workspace,
            checksums: Arc::new(ChecksumStore::new()),
            writer: AtomicWriter::new(),
            ignore,
            runner: Arc::new(SystemRunner),
            todos: Arc::new(TodoList::default()),
            settings,
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }
}

/// 注册内置工具
pub fn builtin_tools(env: &ToolEnv) -> Result<ToolAdapter, RegistryError> {
    let mut adapter = ToolAdapter::new();
    adapter.register(read_tool::ReadFileTool::new(env))?;
    adapter.register(write_tool::WriteFileTool::new(env))?;
    adapter.register(edit_tool::EditFileTool::new(env))?;
    adapter.register(list_tool::ListDirectoryTool::new(env))?;
    adapter.register(shell::RunShellTool::new(env))?;
    adapter.register(grep_tool::SearchContentTool::new(env))?;
    adapter.register(glob_tool::FindFileTool::new(env))?;
    adapter.register(todo_tool::ReadTodosTool::new(env))?;
    adapter.register(todo_tool::WriteTodosTool::new(env))?;
    Ok(adapter)
}


#[cfg(test)]
mod tests {
    use super::test_support::{args, env};
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_tool_names_exact() {
        let temp_dir = TempDir::new().unwrap();
        let adapter = builtin_tools(&env(&temp_dir)).unwrap();
        assert_eq!(adapter.names(), BUILTIN_TOOLS.to_vec());

        let specs = adapter.specs();
        assert_eq!(specs.len(), BUILTIN_TOOLS.len());
        for spec in &specs {
            assert_eq!(spec.parameters["type"], "object");
            assert_eq!(spec.parameters["additionalProperties"], false);
            assert!(!spec.description.is_empty());
        }
    }

    /// Every sample request survives encode, schema decode and serde decode.
    #[test]
    fn test_requests_and_schemas_agree() {
        let temp_dir = TempDir::new().unwrap();
        let env = env(&temp_dir);

        fn check<T: Tool>(tool: &T, request: T::Request)
        where
            T::Request: PartialEq + fmt::Debug,
        {
            let map = encode_request(&request).unwrap();
            let decoded: T::Request = decode_request(&tool.schema(), &map).unwrap();
            assert_eq!(decoded, request, "tool {}", tool.name());
        }

        check(
            &read_tool::ReadFileTool::new(&env),
            read_tool::ReadFileRequest { path: "a.txt".into(), offset: 3, limit: 10 },
        );
        check(
            &write_tool::WriteFileTool::new(&env),
            write_tool::WriteFileRequest { path: "a.txt".into(), content: "x".into() },
        );
        check(
            &edit_tool::EditFileTool::new(&env),
            edit_tool::EditFileRequest {
                path: "a.txt".into(),
                old_text: "a".into(),
                new_text: "b".into(),
                replace_all: true,
            },
        );
        check(
            &list_tool::ListDirectoryTool::new(&env),
            list_tool::ListDirectoryRequest { path: "src".into() },
        );
        check(
            &shell::RunShellTool::new(&env),
            shell::RunShellRequest {
                command: "ls".into(),
                timeout_secs: 5,
                workdir: Some("src".into()),
            },
        );
        check(
            &grep_tool::SearchContentTool::new(&env),
            grep_tool::SearchContentRequest {
                pattern: "fn".into(),
                path: ".".into(),
                include: Some("*.rs".into()),
                case_insensitive: true,
                max_results: 7,
            },
        );
        check(
            &glob_tool::FindFileTool::new(&env),
            glob_tool::FindFileRequest { pattern: "*.rs".into(), path: ".".into(), max_results: 7 },
        );
        check(&todo_tool::ReadTodosTool::new(&env), todo_tool::ReadTodosRequest {});
        check(
            &todo_tool::WriteTodosTool::new(&env),
            todo_tool::WriteTodosRequest {
                todos: vec![TodoItem {
                    id: "1".into(),
                    content: "write tests".into(),
                    status: TodoStatus::InProgress,
                }],
            },
        );
    }

    #[tokio::test]
    async fn test_write_then_read_through_adapter() {
        let temp_dir = TempDir::new().unwrap();
        let adapter = builtin_tools(&env(&temp_dir)).unwrap();
        let ctx = ToolContext::default();

        adapter
            .invoke(&ctx, "write_file", &args(json!({"path": "notes/a.txt", "content": "one\ntwo\n"})))
            .await
            .unwrap();
        let output = adapter
            .invoke(&ctx, "read_file", &args(json!({"path": "notes/a.txt"})))
            .await
            .unwrap();
        assert_eq!(output["content"], "one\ntwo");
        assert_eq!(output["total_lines"], 2);
    }

    #[tokio::test]
    async fn test_outside_workspace_surfaces_as_tool_error() {
        let temp_dir = TempDir::new().unwrap();
        let adapter = builtin_tools(&env(&temp_dir)).unwrap();

        let err = adapter
            .invoke(&ToolContext::default(), "read_file", &args(json!({"path": "../x"})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "OutsideWorkspace");
    }

    #[tokio::test]
    async fn test_edit_after_outside_change_is_stale() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.txt");
        std::fs::write(&path, "alpha\n").unwrap();
        let adapter = builtin_tools(&env(&temp_dir)).unwrap();
        let ctx = ToolContext::default();

        adapter
            .invoke(&ctx, "read_file", &args(json!({"path": "a.txt"})))
            .await
            .unwrap();
        std::fs::write(&path, "changed elsewhere\n").unwrap();

        let err = adapter
            .invoke(
                &ctx,
                "edit_file",
                &args(json!({"path": "a.txt", "old_text": "alpha", "new_text": "beta"})),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "StaleContent");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "changed elsewhere\n");
    }
}
