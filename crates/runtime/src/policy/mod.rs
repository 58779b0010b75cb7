//! Policy Service - 权限策略
//!
//! 职责：
//! - 按规则评估每次工具调用 (纯函数, 不缓存)
//! - 需要确认时经 UI 同步询问用户
//! - 等待确认期间被取消视为拒绝
//!
//! Rules are data ([`PolicyRule`]); this module only compiles and applies
//! them. The most restrictive matching rule wins.

pub mod defaults;

use async_trait::async_trait;
use helm_core::{Decision, PolicyConfig, PolicyRule, RuleCondition, ToolCall, ToolError};
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::tools::Workspace;

pub use defaults::{DANGEROUS_PATTERNS, DangerLevel, DangerousPattern, default_rules};

/// Yes/no round-trip to the user
#[async_trait]
pub trait Confirmer: Send + Sync {
    /// `Err` means no answer could be obtained (UI closed or interrupted)
    async fn confirm(&self, cancel: &CancellationToken, prompt: &str) -> Result<bool, String>;
}

/// Fixed answer, for headless use and tests
#[derive(Debug, Clone, Copy)]
pub struct FixedConfirmer(pub bool);

#[async_trait]
impl Confirmer for FixedConfirmer {
    async fn confirm(&self, _cancel: &CancellationToken, _prompt: &str) -> Result<bool, String> {
        Ok(self.0)
    }
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid tool pattern '{pattern}': {source}")]
    ToolPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("invalid command regex '{pattern}': {source}")]
    CommandRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Result of evaluating one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub decision: Decision,
    /// Reason of the rule that decided, if any
    pub reason: Option<String>,
}

impl Verdict {
    fn allow() -> Self {
        Self {
            decision: Decision::Allow,
            reason: None,
        }
    }
}

enum Condition {
    Always,
    CommandContains(String),
    CommandMatches(Regex),
    PathOutsideWorkspace,
    ArgEquals { field: String, value: Value },
}

struct CompiledRule {
    tool: glob::Pattern,
    when: Condition,
    decision: Decision,
    reason: Option<String>,
}

impl CompiledRule {
    fn compile(rule: &PolicyRule) -> Result<Self, PolicyError> {
        let tool = glob::Pattern::new(&rule.tool).map_err(|source| PolicyError::ToolPattern {
            pattern: rule.tool.clone(),
            source,
        })?;
        let when = match &rule.when {
            RuleCondition::Always => Condition::Always,
            RuleCondition::CommandContains { text } => Condition::CommandContains(text.clone()),
            RuleCondition::CommandMatches { regex } => {
                Condition::CommandMatches(Regex::new(regex).map_err(|source| {
                    PolicyError::CommandRegex {
                        pattern: regex.clone(),
                        source,
                    }
                })?)
            }
            RuleCondition::PathOutsideWorkspace => Condition::PathOutsideWorkspace,
            RuleCondition::ArgEquals { field, value } => Condition::ArgEquals {
                field: field.clone(),
                value: value.clone(),
            },
        };
        Ok(Self {
            tool,
            when,
            decision: rule.decision,
            reason: rule.reason.clone(),
        })
    }

    fn matches(&self, call: &ToolCall, workspace: &Workspace) -> bool {
        if !self.tool.matches(&call.name) {
            return false;
        }
        match &self.when {
            Condition::Always => true,
            Condition::CommandContains(text) => {
                call.arg_str("command").is_some_and(|c| c.contains(text.as_str()))
            }
            Condition::CommandMatches(regex) => {
                call.arg_str("command").is_some_and(|c| regex.is_match(c))
            }
            Condition::PathOutsideWorkspace => ["path", "workdir"].iter().any(|field| {
                call.arg_str(field)
                    .is_some_and(|raw| !raw.trim().is_empty() && !workspace.contains(raw))
            }),
            Condition::ArgEquals { field, value } => call.args.get(field) == Some(value),
        }
    }
}

/// 策略服务
pub struct PolicyService {
    rules: Vec<CompiledRule>,
    workspace: Workspace,
    auto_approve: bool,
    confirmer: Arc<dyn Confirmer>,
}

impl fmt::Debug for PolicyService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyService")
            .field("rules", &self.rules.len())
            .field("workspace", &self.workspace)
            .field("auto_approve", &self.auto_approve)
            .finish_non_exhaustive()
    }
}

impl PolicyService {
    pub fn new(
        config: &PolicyConfig,
        workspace: Workspace,
        confirmer: Arc<dyn Confirmer>,
    ) -> Result<Self, PolicyError> {
        let defaults = if config.include_defaults { default_rules() } else { Vec::new() };
        let rules = defaults
            .iter()
            .chain(config.rules.iter())
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(rules = rules.len(), auto_approve = config.auto_approve, "policy loaded");
        Ok(Self {
            rules,
            workspace,
            auto_approve: config.auto_approve,
            confirmer,
        })
    }

    /// Most restrictive decision over all matching rules, `Allow` if none match
    pub fn evaluate(&self, call: &ToolCall) -> Verdict {
        self.rules
            .iter()
            .filter(|rule| rule.matches(call, &self.workspace))
            .fold(Verdict::allow(), |current, rule| {
                if rule.decision > current.decision {
                    Verdict {
                        decision: rule.decision,
                        reason: rule.reason.clone(),
                    }
                } else {
                    current
                }
            })
    }

    /// Gate a call: `Ok` means proceed
    pub async fn authorize(&self, cancel: &CancellationToken, call: &ToolCall) -> Result<(), ToolError> {
        let verdict = self.evaluate(call);
        let summary = describe_call(call);

        match verdict.decision {
            Decision::Allow => Ok(()),
            Decision::Deny => {
                info!(tool = %call.name, reason = ?verdict.reason, "tool call denied");
                Err(ToolError::PolicyDenied(match verdict.reason {
                    Some(reason) => format!("{}: {}", summary, reason),
                    None => summary,
                }))
            }
            Decision::RequireConfirmation if self.auto_approve => {
                debug!(tool = %call.name, "confirmation auto-approved");
                Ok(())
            }
            Decision::RequireConfirmation => {
                let prompt = match &verdict.reason {
                    Some(reason) => format!("Allow {}? ({})", summary, reason),
                    None => format!("Allow {}?", summary),
                };

                let answer = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!(tool = %call.name, "confirmation cancelled");
                        return Err(ToolError::Cancelled(format!("confirmation for {} was interrupted", call.name)));
                    }
                    answer = self.confirmer.confirm(cancel, &prompt) => answer,
                };

                match answer {
                    Ok(true) => {
                        info!(tool = %call.name, "tool call confirmed");
                        Ok(())
                    }
                    Ok(false) => {
                        info!(tool = %call.name, "tool call rejected by user");
                        Err(ToolError::PolicyDenied(format!("{} was rejected by the user", summary)))
                    }
                    Err(_) if cancel.is_cancelled() => Err(ToolError::Cancelled(format!(
                        "confirmation for {} was interrupted",
                        call.name
                    ))),
                    Err(e) => Err(ToolError::PolicyDenied(format!(
                        "{} could not be confirmed: {}",
                        summary, e
                    ))),
                }
            }
        }
    }
}

/// Human-readable one-line summary of a call
pub fn describe_call(call: &ToolCall) -> String {
    if let Some(command) = call.arg_str("command") {
        return format!("{} `{}`", call.name, command);
    }
    if let Some(path) = call.arg_str("path") {
        return format!("{} {}", call.name, path);
    }
    call.name.clone()
}
