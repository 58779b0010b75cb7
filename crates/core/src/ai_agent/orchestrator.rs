//! Agent Orchestrator - 对话状态机
//!
//! One `run` per goal:
//! - `AwaitingModel`: ask the provider for the next turn
//! - `ExecutingTools`: run every requested call, append one function turn
//! - `Done` on a plain text answer, `Aborted` on cancellation, provider
//!   failure or the round ceiling
//!
//! Tool failures never abort a run. They are encoded into the tool result so
//! the model can adapt.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AgentSettings;
use crate::conversation::{History, ToolCall, ToolResult, Turn};
use crate::error::{AgentError, ToolError};
use crate::llm::provider::{GenerateRequest, LlmProvider, ModelResponse, ToolSpec};
use crate::ui::Ui;

/// Orchestrator 配置
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum tool rounds per goal, `None` for unbounded
    pub max_rounds: Option<usize>,

    /// Prepended to every provider request
    pub system_prompt: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_rounds: Some(50),
            system_prompt: None,
        }
    }
}

impl From<&AgentSettings> for OrchestratorConfig {
    fn from(settings: &AgentSettings) -> Self {
        Self {
            max_rounds: Some(settings.max_rounds),
            system_prompt: settings.system_prompt.clone(),
        }
    }
}

/// Run state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    AwaitingModel,
    ExecutingTools,
    Done,
    Aborted,
}

/// Event driving a state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    TextResponse,
    ToolCallsResponse,
    ResultsCollected,
    Cancelled,
    ProviderFailed,
    CeilingReached,
}

impl OrchestratorState {
    pub fn next(self, event: Transition) -> Self {
        use OrchestratorState::*;
        use Transition::*;

        match (self, event) {
            (Done, _) => Done,
            (Aborted, _) => Aborted,
            (_, Cancelled | ProviderFailed | CeilingReached) => Aborted,
            (AwaitingModel, TextResponse) => Done,
            (AwaitingModel, ToolCallsResponse) => ExecutingTools,
            (ExecutingTools, ResultsCollected) => AwaitingModel,
            // out-of-order events leave the state alone
            (state, _) => state,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

/// 工具执行器抽象
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Run one tool call, policy gate included
    async fn execute_tool(
        &self,
        cancel: &CancellationToken,
        call: &ToolCall,
    ) -> Result<Value, ToolError>;

    /// Tool descriptions handed to the provider
    fn tool_specs(&self) -> Vec<ToolSpec>;
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub answer: String,
    pub history: History,
    pub rounds: usize,
}

/// Agent Orchestrator - 中央控制器
#[derive(Clone)]
pub struct AgentOrchestrator {
    provider: Arc<dyn LlmProvider>,
    executor: Arc<dyn ToolExecutor>,
    ui: Arc<dyn Ui>,
    config: OrchestratorConfig,
    tools: Arc<Vec<ToolSpec>>,
}

impl AgentOrchestrator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        executor: Arc<dyn ToolExecutor>,
        ui: Arc<dyn Ui>,
        config: OrchestratorConfig,
    ) -> Self {
        let tools = Arc::new(executor.tool_specs());
        Self {
            provider,
            executor,
            ui,
            config,
            tools,
        }
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Drive one goal to a final answer
    pub async fn run(&self, cancel: &CancellationToken, goal: &str) -> Result<RunOutcome, AgentError> {
        let mut history = History::new(goal);
        let mut state = OrchestratorState::AwaitingModel;
        let mut pending: Vec<ToolCall> = Vec::new();
        let mut rounds = 0usize;
        let started = Instant::now();

        info!(goal = %goal, "run started");

        loop {
            match state {
                OrchestratorState::AwaitingModel => {
                    let request = GenerateRequest {
                        system_prompt: self.config.system_prompt.as_deref(),
                        history: &history,
                        tools: &self.tools,
                    };

                    let response = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            debug!(state = ?state.next(Transition::Cancelled), "cancelled while awaiting model");
                            return Err(AgentError::Cancelled);
                        }
                        response = self.provider.generate(request) => response,
                    };

                    match response {
                        Err(e) => {
                            warn!(state = ?state.next(Transition::ProviderFailed), error = %e, "provider failed");
                            return Err(AgentError::Provider(e));
                        }
                        Ok(ModelResponse::Text(text)) => {
                            self.ui.write_message(&text);
                            history.push(Turn::Model {
                                text: Some(text),
                                tool_calls: Vec::new(),
                            });
                            state = state.next(Transition::TextResponse);
                        }
                        Ok(ModelResponse::ToolCalls { text, calls }) => {
                            if let Some(max) = self.config.max_rounds {
                                if rounds >= max {
                                    warn!(state = ?state.next(Transition::CeilingReached), max, "tool round ceiling reached");
                                    return Err(AgentError::MaxRoundsExceeded(max));
                                }
                            }
                            history.push(Turn::Model {
                                text,
                                tool_calls: calls.clone(),
                            });
                            pending = calls;
                            state = state.next(Transition::ToolCallsResponse);
                        }
                    }
                }
                OrchestratorState::ExecutingTools => {
                    rounds += 1;
                    let mut results = Vec::with_capacity(pending.len());

                    for call in pending.drain(..) {
                        if cancel.is_cancelled() {
                            debug!(state = ?state.next(Transition::Cancelled), "cancelled between tool calls");
                            return Err(AgentError::Cancelled);
                        }
                        results.push(self.execute_call(cancel, &call).await);
                    }

                    if cancel.is_cancelled() {
                        debug!(state = ?state.next(Transition::Cancelled), "cancelled during tool round");
                        return Err(AgentError::Cancelled);
                    }

                    history.push(Turn::Function { results });
                    state = state.next(Transition::ResultsCollected);
                    debug!(round = rounds, "tool round complete");
                }
                OrchestratorState::Done => {
                    let answer = match history.last() {
                        Some(Turn::Model { text: Some(text), .. }) => text.clone(),
                        _ => String::new(),
                    };
                    info!(
                        rounds,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "run finished"
                    );
                    return Ok(RunOutcome {
                        answer,
                        history,
                        rounds,
                    });
                }
                OrchestratorState::Aborted => return Err(AgentError::Cancelled),
            }
        }
    }

    async fn execute_call(&self, cancel: &CancellationToken, call: &ToolCall) -> ToolResult {
        info!(tool = %call.name, id = %call.id, "Executing tool");
        self.ui.write_status(&format!("Running {}...", call.name));
        let started = Instant::now();

        match self.executor.execute_tool(cancel, call).await {
            Ok(output) => {
                debug!(
                    tool = %call.name,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "tool succeeded"
                );
                ToolResult::output(call, output)
            }
            Err(e) => {
                warn!(tool = %call.name, kind = e.kind(), error = %e, "tool failed");
                ToolResult::error(call, &e)
            }
        }
    }
}
