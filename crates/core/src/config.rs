//! Helm 配置系统
//!
//! 支持 YAML 配置文件和环境变量

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error::AgentError;
use crate::llm::provider::mask_api_key;
use crate::policy::PolicyConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Helm 主配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HelmConfig {
    /// LLM 配置
    #[serde(default)]
    pub llm: LlmConfig,

    /// Agent 配置
    #[serde(default)]
    pub agent: AgentSettings,

    /// 工具配置
    #[serde(default)]
    pub tools: ToolSettings,

    /// 权限策略
    #[serde(default)]
    pub policy: PolicyConfig,
}

impl HelmConfig {
    /// Load from an explicit path, else the user config file, else defaults.
    /// Environment overrides are applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                Self::from_file(path)?
            }
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `~/.config/helm/config.yaml` on Linux
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("helm").join("config.yaml"))
    }

    /// Apply `HELM_MODEL` / `HELM_BASE_URL` overrides
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("HELM_MODEL").filter(|v| !v.is_empty()) {
            self.llm.model = model;
        }
        if let Some(url) = lookup("HELM_BASE_URL").filter(|v| !v.is_empty()) {
            self.llm.base_url = Some(url);
        }
    }
}

/// LLM 配置
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider 名称
    #[serde(default = "default_provider")]
    pub provider: String,

    /// 默认模型
    #[serde(default = "default_model")]
    pub model: String,

    /// API 基础 URL
    pub base_url: Option<String>,

    /// API Key (支持 `${VAR}` 环境变量引用)
    pub api_key: Option<String>,

    /// 请求超时 (秒)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// 启动时列出模型以验证认证
    #[serde(default = "default_true")]
    pub verify_on_start: bool,
}

impl LlmConfig {
    /// Resolve the API key: `HELM_{PROVIDER}_API_KEY`, config value,
    /// `HELM_LLM_API_KEY`, then `OPENAI_API_KEY`.
    pub fn resolve_api_key<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider_var = format!("HELM_{}_API_KEY", self.provider.to_uppercase().replace('-', "_"));
        lookup(&provider_var)
            .or_else(|| {
                self.api_key
                    .as_deref()
                    .and_then(|raw| expand_env_ref(raw, &lookup))
            })
            .or_else(|| lookup("HELM_LLM_API_KEY"))
            .or_else(|| lookup("OPENAI_API_KEY"))
            .filter(|key| !key.trim().is_empty())
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_deref().map(mask_api_key))
            .field("timeout_secs", &self.timeout_secs)
            .field("verify_on_start", &self.verify_on_start)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            api_key: None,
            timeout_secs: default_timeout(),
            verify_on_start: true,
        }
    }
}

/// `${VAR}` → value of VAR, anything else is returned as is
fn expand_env_ref<F>(raw: &str, lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    match raw.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        Some(var) => lookup(var),
        None => Some(raw.to_string()),
    }
}

fn default_true() -> bool {
    true
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_timeout() -> u64 {
    120
}

/// Agent 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// 每个目标最多的工具调用轮数 (防止无限循环)
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,

    /// 系统提示词
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl AgentSettings {
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.max_rounds == 0 || self.max_rounds > 200 {
            return Err(AgentError::Config(format!(
                "max_rounds must be 1..=200, got {}",
                self.max_rounds
            )));
        }
        Ok(())
    }
}

fn default_max_rounds() -> usize {
    50
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            system_prompt: None,
        }
    }
}

/// 工具配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    /// run_shell 默认超时 (秒)
    #[serde(default = "default_shell_timeout")]
    pub shell_timeout_secs: u64,

    /// 每个输出流保留的最大字符数
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,

    /// search/find 默认结果数
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_shell_timeout() -> u64 {
    60
}

fn default_max_output_chars() -> usize {
    30_000
}

fn default_max_results() -> usize {
    100
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            shell_timeout_secs: default_shell_timeout(),
            max_output_chars: default_max_output_chars(),
            max_results: default_max_results(),
        }
    }
}
