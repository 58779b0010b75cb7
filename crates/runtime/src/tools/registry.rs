//! Tool Registry - 工具注册表
//!
//! The adapter the orchestrator talks to:
//! - one tool per name, duplicates are rejected at registration
//! - `invoke` decodes untyped arguments and dispatches by name
//! - `specs` exposes the same schemas to the provider

use helm_core::ToolSpec;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::debug;

use super::ToolError;
use super::trait_mod::{DynTool, Tool, ToolContext, erase};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool already registered: {0}")]
    Duplicate(String),
}

/// 工具注册表
#[derive(Default)]
pub struct ToolAdapter {
    tools: HashMap<&'static str, Arc<dyn DynTool>>,
    /// Registration order, also the order specs are offered in
    order: Vec<&'static str>,
}

impl fmt::Debug for ToolAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolAdapter")
            .field("tools", &self.order)
            .finish()
    }
}

impl ToolAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工具
    pub fn register<T: Tool>(&mut self, tool: T) -> Result<(), RegistryError> {
        self.register_dyn(erase(tool))
    }

    pub fn register_dyn(&mut self, tool: Arc<dyn DynTool>) -> Result<(), RegistryError> {
        let name = tool.name();
        if self.tools.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        self.tools.insert(name, tool);
        self.order.push(name);
        debug!(tool = name, "tool registered");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn DynTool>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Provider-facing descriptions, in registration order
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.schema().to_value(),
            })
            .collect()
    }

    /// 执行工具
    pub async fn invoke(
        &self,
        ctx: &ToolContext,
        name: &str,
        args: &Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let start = Instant::now();
        let result = tool.invoke(ctx, args).await;
        debug!(
            tool = name,
            ok = result.is_ok(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "tool invoked"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::schema::{ToolSchema, ToolSchemaBuilder};
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Serialize, Deserialize)]
    struct PingRequest {
        host: String,
    }

    struct PingTool;

    #[async_trait]
    impl Tool for PingTool {
        type Request = PingRequest;
        type Response = Value;

        fn name(&self) -> &'static str {
            "ping"
        }

        fn description(&self) -> &'static str {
            "Ping a host"
        }

        fn schema(&self) -> ToolSchema {
            ToolSchemaBuilder::new().required_string("host", "Host").build()
        }

        async fn run(&self, _ctx: &ToolContext, request: PingRequest) -> Result<Value, ToolError> {
            Ok(json!({ "pong": request.host }))
        }
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut adapter = ToolAdapter::new();
        adapter.register(PingTool).unwrap();
        let err = adapter.register(PingTool).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(name) if name == "ping"));
        assert_eq!(adapter.len(), 1);
    }

    #[tokio::test]
    async fn test_invoke_dispatches_by_name() {
        let mut adapter = ToolAdapter::new();
        adapter.register(PingTool).unwrap();

        let output = adapter
            .invoke(&ToolContext::default(), "ping", &args(json!({"host": "a"})))
            .await
            .unwrap();
        assert_eq!(output, json!({"pong": "a"}));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let adapter = ToolAdapter::new();
        let err = adapter
            .invoke(&ToolContext::default(), "nope", &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(name) if name == "nope"));
    }

    #[tokio::test]
    async fn test_invalid_arguments_name_the_field() {
        let mut adapter = ToolAdapter::new();
        adapter.register(PingTool).unwrap();

        let err = adapter
            .invoke(&ToolContext::default(), "ping", &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { field, .. } if field == "host"));
    }

    #[test]
    fn test_specs_match_schema() {
        let mut adapter = ToolAdapter::new();
        adapter.register(PingTool).unwrap();

        let specs = adapter.specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "ping");
        assert_eq!(specs[0].parameters, PingTool.schema().to_value());
    }
}
