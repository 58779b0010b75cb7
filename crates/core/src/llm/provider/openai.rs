//! OpenAI Provider Implementation
//!
//! Supports:
//! - OpenAI API (Chat Completions with function tools)
//! - Compatible APIs (local servers, gateways) via `base_url`

use super::*;
use crate::conversation::Turn;
use reqwest::{Client, StatusCode};
use serde_json::{Map, json};
use std::sync::RwLock;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI Provider
pub struct OpenAiProvider {
    config: ProviderConfig,
    client: Client,
    model: RwLock<String>,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("name", &self.config.name)
            .field("model", &self.model())
            .finish_non_exhaustive()
    }
}

impl OpenAiProvider {
    /// Create a new OpenAI provider
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        if config.default_model.trim().is_empty() {
            return Err(ProviderError::InvalidConfig {
                message: "model must not be empty".to_string(),
            });
        }
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ProviderError::Network { source: e })?;
        let model = RwLock::new(config.default_model.clone());

        Ok(Self {
            config,
            client,
            model,
        })
    }

    /// Get base URL for API calls
    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    /// Build authorization header
    fn auth_header(&self) -> String {
        format!("Bearer {}", self.config.api_key)
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn generate(&self, request: GenerateRequest<'_>) -> Result<ModelResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url());
        let model = self.model();

        let mut body = json!({
            "model": model,
            "messages": render_messages(&request),
            "stream": false,
        });
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(request.tools.iter().map(ToolSpec::to_function).collect());
        }

        debug!(model = %model, turns = request.history.len(), "chat completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network { source: e })?;

        let status = response.status();
        if !status.is_success() {
            let error: Value = response.json().await.unwrap_or_else(|_| json!({}));
            return Err(status_error(status, &error, &model));
        }

        let data: Value = response.json().await.map_err(|e| ProviderError::InvalidResponse {
            message: format!("Failed to parse response: {}", e),
        })?;
        parse_response(&data)
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/models", self.base_url());

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| ProviderError::Network { source: e })?;

        let status = response.status();
        if !status.is_success() {
            let error: Value = response.json().await.unwrap_or_else(|_| json!({}));
            return Err(status_error(status, &error, &self.model()));
        }

        let data: Value = response.json().await.map_err(|e| ProviderError::InvalidResponse {
            message: format!("Failed to parse models: {}", e),
        })?;

        let mut models: Vec<String> = data["data"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item["id"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        models.sort();
        Ok(models)
    }

    fn set_model(&self, model: &str) -> Result<(), ProviderError> {
        let model = model.trim();
        if model.is_empty() {
            return Err(ProviderError::InvalidRequest {
                message: "model name must not be empty".to_string(),
            });
        }
        let mut current = self.model.write().unwrap_or_else(|e| e.into_inner());
        *current = model.to_string();
        Ok(())
    }

    fn model(&self) -> String {
        self.model
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Render history as chat messages
fn render_messages(request: &GenerateRequest<'_>) -> Vec<Value> {
    let mut messages = Vec::with_capacity(request.history.len() + 1);
    if let Some(prompt) = request.system_prompt {
        messages.push(json!({ "role": "system", "content": prompt }));
    }

    for turn in request.history.turns() {
        match turn {
            Turn::User { text } => {
                messages.push(json!({ "role": "user", "content": text }));
            }
            Turn::Model { text, tool_calls } => {
                let mut message = json!({ "role": "assistant", "content": text });
                if !tool_calls.is_empty() {
                    message["tool_calls"] = tool_calls
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": Value::Object(call.args.clone()).to_string(),
                                }
                            })
                        })
                        .collect();
                }
                messages.push(message);
            }
            Turn::Function { results } => {
                for result in results {
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": result.id,
                        "name": result.name,
                        "content": result.payload().to_string(),
                    }));
                }
            }
        }
    }

    messages
}

fn parse_response(data: &Value) -> Result<ModelResponse, ProviderError> {
    let message = data["choices"]
        .get(0)
        .map(|choice| &choice["message"])
        .ok_or_else(|| ProviderError::InvalidResponse {
            message: "response has no choices".to_string(),
        })?;

    let text = message["content"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let calls = match message["tool_calls"].as_array() {
        Some(calls) => calls
            .iter()
            .enumerate()
            .map(|(index, raw)| parse_tool_call(index, raw))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    if calls.is_empty() {
        Ok(ModelResponse::Text(text.unwrap_or_default()))
    } else {
        Ok(ModelResponse::ToolCalls { text, calls })
    }
}

fn parse_tool_call(index: usize, raw: &Value) -> Result<ToolCall, ProviderError> {
    let missing = |field: &str| ProviderError::InvalidResponse {
        message: format!("tool call {} has no {}", index, field),
    };
    let id = raw["id"].as_str().ok_or_else(|| missing("id"))?;
    let name = raw["function"]["name"]
        .as_str()
        .ok_or_else(|| missing("function name"))?;
    let arguments = raw["function"]["arguments"].as_str().unwrap_or("{}");

    let args = match serde_json::from_str::<Value>(arguments) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            // the adapter reports the missing fields back to the model
            warn!(tool = %name, "tool call arguments are not a JSON object");
            Map::new()
        }
    };

    Ok(ToolCall::new(id, name, args))
}

fn status_error(status: StatusCode, error: &Value, model: &str) -> ProviderError {
    let message = error["error"]["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| format!("API returned status {}", status));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Auth { message },
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited { retry_after: 60 },
        StatusCode::NOT_FOUND => ProviderError::ModelNotFound {
            model: model.to_string(),
        },
        StatusCode::BAD_REQUEST => ProviderError::InvalidRequest { message },
        _ => ProviderError::Api {
            message,
            status_code: Some(status.as_u16()),
        },
    }
}
