//! Executor - 受控工具执行
//!
//! 职责：
//! - 名称解析 (未知工具直接报错)
//! - 策略门禁 (允许 / 确认 / 拒绝)
//! - 经工具适配器执行
//!
//! This is the [`ToolExecutor`] the orchestrator drives.

use async_trait::async_trait;
use helm_core::{PolicyConfig, ToolCall, ToolError, ToolExecutor, ToolSettings, ToolSpec};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::policy::{Confirmer, PolicyError, PolicyService};
use crate::tools::{RegistryError, ToolAdapter, ToolContext, ToolEnv, Workspace, builtin_tools};

/// 执行器构建错误
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("workspace unavailable: {0}")]
    Workspace(#[source] ToolError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// Policy-gated tool executor
#[derive(Debug)]
pub struct GuardedExecutor {
    policy: PolicyService,
    adapter: ToolAdapter,
}

impl GuardedExecutor {
    pub fn new(policy: PolicyService, adapter: ToolAdapter) -> Self {
        Self { policy, adapter }
    }

    /// Workspace, built-in tools and policy in one step
    pub fn build(
        workspace_root: &std::path::Path,
        settings: &ToolSettings,
        policy: &PolicyConfig,
        confirmer: Arc<dyn Confirmer>,
    ) -> Result<Self, SetupError> {
        let workspace = Workspace::open(workspace_root).map_err(SetupError::Workspace)?;
        let env = ToolEnv::new(workspace.clone(), settings.clone());
        let adapter = builtin_tools(&env)?;
        let policy = PolicyService::new(policy, workspace.clone(), confirmer)?;

        info!(workspace = %workspace.root().display(), tools = adapter.len(), "tools ready");
        Ok(Self::new(policy, adapter))
    }

    pub fn adapter(&self) -> &ToolAdapter {
        &self.adapter
    }

    pub fn policy(&self) -> &PolicyService {
        &self.policy
    }
}

#[async_trait]
impl ToolExecutor for GuardedExecutor {
    async fn execute_tool(&self, cancel: &CancellationToken, call: &ToolCall) -> Result<Value, ToolError> {
        if !self.adapter.contains(&call.name) {
            return Err(ToolError::UnknownTool(call.name.clone()));
        }

        self.policy.authorize(cancel, call).await?;
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled(format!("{} was not started", call.name)));
        }

        debug!(tool = %call.name, id = %call.id, "executing tool");
        let ctx = ToolContext::new(cancel.clone());
        self.adapter.invoke(&ctx, &call.name, &call.args).await
    }

    fn tool_specs(&self) -> Vec<ToolSpec> {
        self.adapter.specs()
    }
}
