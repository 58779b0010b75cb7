//! Helm Core - 核心数据模型与对话编排
//!
//! 包含：
//! - conversation: Goal/History/ToolCall/ToolResult
//! - error: 错误分类
//! - llm: Provider 抽象与 OpenAI 兼容实现
//! - ai_agent: Orchestrator 状态机
//! - ui / signal: UI 能力接口与一次性就绪信号
//! - policy / config: 策略规则与 YAML 配置

pub mod ai_agent;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod policy;
pub mod signal;
pub mod ui;

pub use ai_agent::{
    AgentOrchestrator, OrchestratorConfig, OrchestratorState, RunOutcome, ToolExecutor, Transition,
};
pub use config::{AgentSettings, ConfigError, HelmConfig, LlmConfig, ToolSettings};
pub use conversation::{History, ToolCall, ToolOutcome, ToolResult, Turn};
pub use error::{AgentError, ToolError};
pub use llm::provider::{
    GenerateRequest, LlmProvider, ModelResponse, OpenAiProvider, ProviderConfig, ProviderError,
    ProviderFactory, ToolSpec,
};
pub use policy::{Decision, PolicyConfig, PolicyRule, RuleCondition};
pub use signal::{ReadyNotifier, ReadySignal, ready_signal};
pub use ui::{Ui, UiCommand, UiError};
