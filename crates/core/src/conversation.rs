//! Conversation model - 对话历史
//!
//! A `History` belongs to exactly one orchestrator run. It only grows: turns are
//! appended, never edited or removed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ToolError;

/// Tool call request issued by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }

    /// String argument by name, if present
    pub fn arg_str(&self, field: &str) -> Option<&str> {
        self.args.get(field).and_then(Value::as_str)
    }
}

/// Outcome half of a tool result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolOutcome {
    Output(Value),
    Error { kind: String, message: String },
}

/// Tool call result, correlated to its call by `id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub id: String,
    pub name: String,
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn output(call: &ToolCall, value: Value) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            outcome: ToolOutcome::Output(value),
        }
    }

    pub fn error(call: &ToolCall, error: &ToolError) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            outcome: ToolOutcome::Error {
                kind: error.kind().to_string(),
                message: error.to_string(),
            },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Error { .. })
    }

    /// JSON payload fed back to the provider
    pub fn payload(&self) -> Value {
        match &self.outcome {
            ToolOutcome::Output(value) => value.clone(),
            ToolOutcome::Error { kind, message } => serde_json::json!({
                "error": { "kind": kind, "message": message }
            }),
        }
    }
}

/// A single turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    User {
        text: String,
    },
    Model {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Function {
        results: Vec<ToolResult>,
    },
}

/// Append-only turn sequence for one goal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    /// Fresh history seeded with the goal as the first user turn
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::User { text: goal.into() }],
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn goal(&self) -> Option<&str> {
        match self.turns.first() {
            Some(Turn::User { text }) => Some(text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call() -> ToolCall {
        let args = json!({"path": "."}).as_object().cloned().unwrap_or_default();
        ToolCall::new("call_1", "list_directory", args)
    }

    #[test]
    fn test_history_seeded_with_goal() {
        let history = History::new("List files");
        assert_eq!(history.len(), 1);
        assert_eq!(history.goal(), Some("List files"));
    }

    #[test]
    fn test_result_echoes_call_identity() {
        let call = call();
        let ok = ToolResult::output(&call, json!({"entries": []}));
        assert_eq!(ok.id, "call_1");
        assert_eq!(ok.name, "list_directory");
        assert!(!ok.is_error());

        let err = ToolResult::error(&call, &ToolError::UnknownTool("nope".into()));
        assert!(err.is_error());
        assert_eq!(err.payload()["error"]["kind"], "UnknownTool");
    }

    #[test]
    fn test_turn_serializes_with_role_tag() {
        let turn = Turn::Model {
            text: None,
            tool_calls: vec![call()],
        };
        let value = serde_json::to_value(&turn).unwrap();
        assert_eq!(value["role"], "model");
        assert_eq!(value["tool_calls"][0]["args"]["path"], ".");
        assert!(value.get("text").is_none());
    }
}
