//! Provider Configuration - LLM provider creation and API key resolution.

use async_trait::async_trait;
use helm_core::{LlmConfig, LlmProvider, OpenAiProvider, ProviderConfig, ProviderError, ProviderFactory};
use std::sync::Arc;
use tracing::{debug, info};

/// Build the provider configuration, resolving the API key through `lookup`.
pub(crate) fn create_provider_config<F>(llm: &LlmConfig, lookup: F) -> Result<ProviderConfig, ProviderError>
where
    F: Fn(&str) -> Option<String>,
{
    if !matches!(llm.provider.as_str(), "openai" | "openai-compatible") {
        return Err(ProviderError::InvalidConfig {
            message: format!(
                "unsupported provider '{}', expected openai or openai-compatible",
                llm.provider
            ),
        });
    }

    let api_key = llm
        .resolve_api_key(lookup)
        .ok_or_else(|| ProviderError::InvalidConfig {
            message: format!(
                "no API key for provider '{}'; set HELM_{}_API_KEY or llm.api_key",
                llm.provider,
                llm.provider.to_uppercase().replace('-', "_")
            ),
        })?;

    Ok(ProviderConfig {
        name: llm.provider.clone(),
        api_key,
        base_url: llm.base_url.clone(),
        default_model: llm.model.clone(),
        timeout_ms: llm.timeout_secs.saturating_mul(1000),
    })
}

/// Creates the configured provider in the background init activity
#[derive(Debug, Clone)]
pub struct ConfiguredProviderFactory {
    llm: LlmConfig,
}

impl ConfiguredProviderFactory {
    pub fn new(llm: LlmConfig) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl ProviderFactory for ConfiguredProviderFactory {
    async fn create(&self) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let config = create_provider_config(&self.llm, |key| std::env::var(key).ok())?;
        debug!(config = ?config, "creating provider");
        let provider = OpenAiProvider::new(config)?;

        if self.llm.verify_on_start {
            let models = provider.list_models().await?;
            info!(models = models.len(), "provider verified");
        }

        Ok(Arc::new(provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_provider_config_from_llm_settings() {
        let llm = LlmConfig {
            base_url: Some("http://localhost:8080/v1".to_string()),
            timeout_secs: 30,
            ..LlmConfig::default()
        };
        let config = create_provider_config(&llm, env(&[("HELM_OPENAI_API_KEY", "sk-test")])).unwrap();

        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.default_model, "gpt-4o-mini");
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080/v1"));
        assert_eq!(config.timeout_ms, 30_000);
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let err = create_provider_config(&LlmConfig::default(), env(&[])).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidConfig { message } if message.contains("HELM_OPENAI_API_KEY")));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let llm = LlmConfig {
            provider: "carrier-pigeon".to_string(),
            ..LlmConfig::default()
        };
        let err = create_provider_config(&llm, env(&[("OPENAI_API_KEY", "k")])).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn test_factory_fails_without_key() {
        let llm = LlmConfig {
            provider: "openai-compatible".to_string(),
            api_key: Some("${HELM_TEST_UNSET_VARIABLE_FOR_FACTORY}".to_string()),
            ..LlmConfig::default()
        };
        // only the generic fallbacks could still provide a key
        if std::env::var("HELM_LLM_API_KEY").is_ok() || std::env::var("OPENAI_API_KEY").is_ok() {
            return;
        }
        let result = ConfiguredProviderFactory::new(llm).create().await;
        assert!(matches!(result, Err(ProviderError::InvalidConfig { .. })));
    }
}
