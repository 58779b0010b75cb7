//! Helm AI Agent Module
//!
//! 职责:
//! - Agent Orchestrator: 对话状态机, 调度模型请求与工具调用
//! - ToolExecutor: 工具执行抽象 (策略门控 + 工具适配层)

pub mod orchestrator;

pub use orchestrator::{
    AgentOrchestrator,
    OrchestratorConfig,
    OrchestratorState,
    RunOutcome,
    ToolExecutor,
    Transition,
};
