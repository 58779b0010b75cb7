//! Error taxonomy shared by the orchestrator, tools and lifecycle.

use std::path::PathBuf;
use thiserror::Error;

use crate::llm::provider::ProviderError;

/// 工具错误
///
/// Every variant is recoverable by the model: the orchestrator encodes it into
/// a `ToolResult` error payload instead of aborting the run.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid argument '{field}': {reason}")]
    InvalidArguments { field: String, reason: String },

    #[error("{} changed since it was last read; read it again before editing", path.display())]
    StaleContent { path: PathBuf },

    #[error("denied by policy: {0}")]
    PolicyDenied(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("path is outside the workspace: {}", .0.display())]
    OutsideWorkspace(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

impl ToolError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Stable category name carried in tool result payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "UnknownTool",
            Self::InvalidArguments { .. } => "InvalidArguments",
            Self::StaleContent { .. } => "StaleContent",
            Self::PolicyDenied(_) => "PolicyDenied",
            Self::Cancelled(_) => "Cancelled",
            Self::OutsideWorkspace(_) => "OutsideWorkspace",
            Self::Io(_) => "IOFailure",
            Self::ExecutionFailed(_) => "ExecutionFailed",
        }
    }
}

/// Agent 错误类型
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("provider failure: {0}")]
    Provider(#[from] ProviderError),

    #[error("cancelled")]
    Cancelled,

    #[error("stopped after {0} tool rounds without a final answer")]
    MaxRoundsExceeded(usize),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
