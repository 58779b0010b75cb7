//! LLM Provider Abstraction
//!
//! Responsibilities:
//! - Provider trait consumed by the orchestrator and the command handler
//! - Factory seam so construction (network/auth setup) can run in the background
//! - Common request/response types

pub mod openai;

pub use openai::OpenAiProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::conversation::{History, ToolCall};

/// Provider-specific errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("API error: {message}")]
    Api {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Model not found: {model}")]
    ModelNotFound { model: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Network error: {source}")]
    Network {
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid config: {message}")]
    InvalidConfig { message: String },
}

/// Tool description handed to the provider's function-calling protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: Value,
}

impl ToolSpec {
    /// OpenAI function tool format
    pub fn to_function(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// Complete request to LLM
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    pub system_prompt: Option<&'a str>,
    pub history: &'a History,
    pub tools: &'a [ToolSpec],
}

/// Response from LLM: either a final answer or tool calls to run
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    Text(String),
    ToolCalls {
        text: Option<String>,
        calls: Vec<ToolCall>,
    },
}

/// LLM Provider trait
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get provider name
    fn name(&self) -> &str;

    /// One model turn for the given history
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<ModelResponse, ProviderError>;

    /// Live model identifiers
    async fn list_models(&self) -> Result<Vec<String>, ProviderError>;

    /// Switch the active model
    fn set_model(&self, model: &str) -> Result<(), ProviderError>;

    /// Active model
    fn model(&self) -> String;
}

/// Builds a provider. Construction may be slow.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    async fn create(&self) -> Result<Arc<dyn LlmProvider>, ProviderError>;
}

/// Provider configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub api_key: String,
    pub base_url: Option<String>,
    pub default_model: String,
    pub timeout_ms: u64,
}

/// API key for logs: at most the first four characters survive
pub fn mask_api_key(key: &str) -> String {
    if key.chars().count() > 8 {
        format!("{}***", key.chars().take(4).collect::<String>())
    } else {
        "***".to_string()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_config_debug_masks_key() {
        let config = ProviderConfig {
            name: "openai".to_string(),
            api_key: "sk-1234567890abcdef".to_string(),
            base_url: None,
            default_model: "gpt-4o".to_string(),
            timeout_ms: 1000,
        };
        let debug = format!("{:?}", config);
        assert!(debug.contains("sk-1***"));
        assert!(!debug.contains("1234567890abcdef"));
    }

    #[test]
    fn test_mask_handles_multibyte_keys() {
        assert_eq!(mask_api_key("ключ-секрет-значение"), "ключ***");
        assert_eq!(mask_api_key("é-short"), "***");
    }

    #[test]
    fn test_tool_spec_function_format() {
        let spec = ToolSpec {
            name: "read_file".to_string(),
            description: "Read a file".to_string(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        };
        let value = spec.to_function();
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["name"], "read_file");
        assert_eq!(value["function"]["parameters"]["type"], "object");
    }
}
