//! Tool Trait - 工具接口定义
//!
//! 设计原则：
//! - 每个工具声明类型化的 Request / Response
//! - 参数先经 schema 校验和补默认值，再由 serde 反序列化
//! - 统一的错误处理 (ToolError)
//! - 注册表只看到擦除类型后的 [`DynTool`]

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::ToolError;
use super::schema::ToolSchema;

/// 工具执行上下文
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Fires when the user aborts the current goal
    pub cancel: CancellationToken,
}

impl ToolContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }
}

/// Tool Trait - 所有工具必须实现
#[async_trait]
pub trait Tool: Send + Sync + 'static {
    type Request: DeserializeOwned + Serialize + Send + 'static;
    type Response: Serialize + Send + 'static;

    /// 工具名称
    fn name(&self) -> &'static str;

    /// 工具描述
    fn description(&self) -> &'static str;

    /// 参数模式, must describe every field of `Request`
    fn schema(&self) -> ToolSchema;

    /// 执行工具
    async fn run(&self, ctx: &ToolContext, request: Self::Request)
    -> Result<Self::Response, ToolError>;
}

/// 类型擦除后的工具
#[async_trait]
pub trait DynTool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn schema(&self) -> &ToolSchema;

    async fn invoke(&self, ctx: &ToolContext, args: &Map<String, Value>)
    -> Result<Value, ToolError>;
}

struct Erased<T: Tool> {
    tool: T,
    schema: ToolSchema,
}

#[async_trait]
impl<T: Tool> DynTool for Erased<T> {
    fn name(&self) -> &'static str {
        self.tool.name()
    }

    fn description(&self) -> &'static str {
        self.tool.description()
    }

    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn invoke(
        &self,
        ctx: &ToolContext,
        args: &Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let request: T::Request = decode_request(&self.schema, args)?;
        let response = self.tool.run(ctx, request).await?;
        serde_json::to_value(response)
            .map_err(|e| ToolError::ExecutionFailed(format!("unserializable response: {}", e)))
    }
}

/// Box a typed tool for the registry; the schema is built once here
pub fn erase<T: Tool>(tool: T) -> Arc<dyn DynTool> {
    let schema = tool.schema();
    Arc::new(Erased { tool, schema })
}

/// Schema check, then serde into the typed request
pub fn decode_request<R: DeserializeOwned>(
    schema: &ToolSchema,
    args: &Map<String, Value>,
) -> Result<R, ToolError> {
    let normalized = schema.decode(args)?;
    serde_json::from_value(Value::Object(normalized)).map_err(|e| {
        // serde errors rarely carry a field path, so name the whole argument set
        ToolError::invalid("arguments", e.to_string())
    })
}

/// Typed request back to the untyped argument map
pub fn encode_request<R: Serialize>(request: &R) -> Result<Map<String, Value>, ToolError> {
    match serde_json::to_value(request) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ToolError::ExecutionFailed(format!(
            "request encoded as {} instead of an object",
            other
        ))),
        Err(e) => Err(ToolError::ExecutionFailed(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::schema::ToolSchemaBuilder;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct EchoRequest {
        text: String,
        times: u64,
    }

    #[derive(Debug, Serialize)]
    struct EchoResponse {
        echoed: String,
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        type Request = EchoRequest;
        type Response = EchoResponse;

        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Repeat text"
        }

        fn schema(&self) -> ToolSchema {
            ToolSchemaBuilder::new()
                .required_string("text", "Text to repeat")
                .integer_default("times", "Repetitions", 2)
                .build()
        }

        async fn run(
            &self,
            _ctx: &ToolContext,
            request: EchoRequest,
        ) -> Result<EchoResponse, ToolError> {
            Ok(EchoResponse {
                echoed: request.text.repeat(request.times as usize),
            })
        }
    }

    #[tokio::test]
    async fn test_erased_tool_applies_defaults() {
        let tool = erase(EchoTool);
        let args = json!({"text": "ab"}).as_object().cloned().unwrap();

        let output = tool.invoke(&ToolContext::default(), &args).await.unwrap();
        assert_eq!(output, json!({"echoed": "abab"}));
    }

    #[tokio::test]
    async fn test_erased_tool_rejects_bad_arguments() {
        let tool = erase(EchoTool);
        let args = json!({"text": 5}).as_object().cloned().unwrap();

        let err = tool.invoke(&ToolContext::default(), &args).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { field, .. } if field == "text"));
    }

    #[test]
    fn test_encode_then_decode_is_lossless() {
        let request = EchoRequest { text: "x".to_string(), times: 3 };
        let map = encode_request(&request).unwrap();
        let decoded: EchoRequest = decode_request(&EchoTool.schema(), &map).unwrap();
        assert_eq!(decoded, request);
    }
}
