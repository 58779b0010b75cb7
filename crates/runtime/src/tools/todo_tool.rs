//! Todo Tools - 会话任务列表
//!
//! The model keeps its own plan here. `write_todos` replaces the whole list;
//! `read_todos` returns it. The list lives for the process only.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::schema::{ArgSpec, ArgType, ToolSchema, ToolSchemaBuilder};
use super::{Tool, ToolContext, ToolEnv, ToolError};

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: String,
    pub content: String,
    pub status: TodoStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TodoCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
}

impl TodoCounts {
    fn of(items: &[TodoItem]) -> Self {
        items.iter().fold(Self::default(), |mut counts, item| {
            match item.status {
                TodoStatus::Pending => counts.pending += 1,
                TodoStatus::InProgress => counts.in_progress += 1,
                TodoStatus::Completed => counts.completed += 1,
            }
            counts
        })
    }
}

/// 任务列表
#[derive(Debug, Default)]
pub struct TodoList {
    items: Mutex<Vec<TodoItem>>,
}

impl TodoList {
    pub fn snapshot(&self) -> Vec<TodoItem> {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Validate then replace the whole list
    pub fn replace(&self, items: Vec<TodoItem>) -> Result<(), ToolError> {
        validate(&items)?;
        *self.items.lock().unwrap_or_else(|e| e.into_inner()) = items;
        Ok(())
    }
}

fn validate(items: &[TodoItem]) -> Result<(), ToolError> {
    let mut ids = HashSet::new();
    for (i, item) in items.iter().enumerate() {
        if item.id.trim().is_empty() {
            return Err(ToolError::invalid(format!("todos[{}].id", i), "must not be empty"));
        }
        if !ids.insert(item.id.as_str()) {
            return Err(ToolError::invalid(
                format!("todos[{}].id", i),
                format!("duplicate id '{}'", item.id),
            ));
        }
        if item.content.trim().is_empty() {
            return Err(ToolError::invalid(format!("todos[{}].content", i), "must not be empty"));
        }
    }
    if TodoCounts::of(items).in_progress > 1 {
        return Err(ToolError::invalid("todos", "at most one item may be in_progress"));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadTodosRequest {}

#[derive(Debug, Clone, Serialize)]
pub struct TodosResponse {
    pub todos: Vec<TodoItem>,
    pub counts: TodoCounts,
}

impl TodosResponse {
    fn new(todos: Vec<TodoItem>) -> Self {
        let counts = TodoCounts::of(&todos);
        Self { todos, counts }
    }
}

pub struct ReadTodosTool {
    todos: Arc<TodoList>,
}

impl ReadTodosTool {
    pub fn new(env: &ToolEnv) -> Self {
        Self {
            todos: env.todos.clone(),
        }
    }
}

#[async_trait]
impl Tool for ReadTodosTool {
    type Request = ReadTodosRequest;
    type Response = TodosResponse;

    fn name(&self) -> &'static str {
        "read_todos"
    }

    fn description(&self) -> &'static str {
        "Read the current task list."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::default()
    }

    async fn run(&self, _ctx: &ToolContext, _request: ReadTodosRequest) -> Result<TodosResponse, ToolError> {
        Ok(TodosResponse::new(self.todos.snapshot()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteTodosRequest {
    pub todos: Vec<TodoItem>,
}

pub struct WriteTodosTool {
    todos: Arc<TodoList>,
}

impl WriteTodosTool {
    pub fn new(env: &ToolEnv) -> Self {
        Self {
            todos: env.todos.clone(),
        }
    }
}

#[async_trait]
impl Tool for WriteTodosTool {
    type Request = WriteTodosRequest;
    type Response = TodosResponse;

    fn name(&self) -> &'static str {
        "write_todos"
    }

    fn description(&self) -> &'static str {
        "Replace the task list. Keep at most one item in_progress and mark items completed as you finish them."
    }

    fn schema(&self) -> ToolSchema {
        let item = ArgType::Object(vec![
            ArgSpec::new("id", ArgType::String, "Unique id").required(),
            ArgSpec::new("content", ArgType::String, "What to do").required(),
            ArgSpec::new(
                "status",
                ArgType::Enum(vec!["pending", "in_progress", "completed"]),
                "Current state",
            )
            .required(),
        ]);
        ToolSchemaBuilder::new()
            .required_array("todos", "The complete new task list", item)
            .build()
    }

    async fn run(&self, _ctx: &ToolContext, request: WriteTodosRequest) -> Result<TodosResponse, ToolError> {
        self.todos.replace(request.todos)?;
        let todos = self.todos.snapshot();
        debug!(count = todos.len(), "todos replaced");
        Ok(TodosResponse::new(todos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{args, env};
    use crate::tools::{ToolAdapter, builtin_tools};
    use serde_json::json;
    use tempfile::TempDir;

    fn item(id: &str, status: TodoStatus) -> TodoItem {
        TodoItem {
            id: id.to_string(),
            content: format!("task {}", id),
            status,
        }
    }

    fn adapter(temp_dir: &TempDir) -> ToolAdapter {
        builtin_tools(&env(temp_dir)).unwrap()
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let adapter = adapter(&temp_dir);
        let ctx = ToolContext::default();

        let written = adapter
            .invoke(
                &ctx,
                "write_todos",
                &args(json!({"todos": [
                    {"id": "1", "content": "explore", "status": "completed"},
                    {"id": "2", "content": "implement", "status": "in_progress"},
                    {"id": "3", "content": "test", "status": "pending"}
                ]})),
            )
            .await
            .unwrap();
        assert_eq!(written["counts"], json!({"pending": 1, "in_progress": 1, "completed": 1}));

        let read = adapter.invoke(&ctx, "read_todos", &args(json!({}))).await.unwrap();
        assert_eq!(read["todos"][1]["content"], "implement");
        assert_eq!(read["todos"][1]["status"], "in_progress");
    }

    #[test]
    fn test_validation() {
        let list = TodoList::default();

        let err = list
            .replace(vec![item("1", TodoStatus::Pending), item("1", TodoStatus::Pending)])
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { field, .. } if field == "todos[1].id"));

        let err = list
            .replace(vec![item("1", TodoStatus::InProgress), item("2", TodoStatus::InProgress)])
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { field, .. } if field == "todos"));

        let mut blank = item("1", TodoStatus::Pending);
        blank.content = "  ".to_string();
        assert!(list.replace(vec![blank]).is_err());

        // rejected writes leave the list untouched
        assert!(list.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_bad_status_names_field() {
        let temp_dir = TempDir::new().unwrap();
        let err = adapter(&temp_dir)
            .invoke(
                &ToolContext::default(),
                "write_todos",
                &args(json!({"todos": [{"id": "1", "content": "x", "status": "done"}]})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { field, .. } if field == "todos[0].status"));
    }

    #[tokio::test]
    async fn test_read_todos_rejects_arguments() {
        let temp_dir = TempDir::new().unwrap();
        let err = adapter(&temp_dir)
            .invoke(&ToolContext::default(), "read_todos", &args(json!({"all": true})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { field, .. } if field == "all"));
    }
}
