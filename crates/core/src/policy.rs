//! Policy rule data model
//!
//! Rules are plain data loaded from configuration; evaluation lives in the
//! runtime policy service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Policy decision. Variants are ordered from least to most restrictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    RequireConfirmation,
    Deny,
}

/// Condition a rule tests against a tool call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCondition {
    #[default]
    Always,
    /// `command` argument contains the text
    CommandContains { text: String },
    /// `command` argument matches the regex
    CommandMatches { regex: String },
    /// `path` argument resolves outside the workspace root
    PathOutsideWorkspace,
    /// argument `field` equals `value`
    ArgEquals { field: String, value: Value },
}

/// 权限规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Glob over tool names, `*` for every tool
    #[serde(default = "default_tool_glob")]
    pub tool: String,

    #[serde(default)]
    pub when: RuleCondition,

    pub decision: Decision,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PolicyRule {
    pub fn new(tool: impl Into<String>, when: RuleCondition, decision: Decision) -> Self {
        Self {
            tool: tool.into(),
            when,
            decision,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

fn default_tool_glob() -> String {
    "*".to_string()
}

/// Policy 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Prepend the built-in dangerous-command rules
    #[serde(default = "default_true")]
    pub include_defaults: bool,

    /// Treat `RequireConfirmation` as `Allow`. `Deny` still applies.
    #[serde(default)]
    pub auto_approve: bool,

    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            include_defaults: true,
            auto_approve: false,
            rules: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_ordering_is_restrictiveness() {
        assert!(Decision::Deny > Decision::RequireConfirmation);
        assert!(Decision::RequireConfirmation > Decision::Allow);
        let worst = [Decision::Allow, Decision::Deny, Decision::RequireConfirmation]
            .into_iter()
            .max();
        assert_eq!(worst, Some(Decision::Deny));
    }

    #[test]
    fn test_rules_parse_from_yaml() {
        let yaml = r#"
include_defaults: false
rules:
  - tool: run_shell
    when:
      kind: command_contains
      text: "git push"
    decision: require_confirmation
    reason: pushes leave the machine
  - tool: "write_*"
    when:
      kind: path_outside_workspace
    decision: deny
  - decision: allow
"#;
        let config: PolicyConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.include_defaults);
        assert!(!config.auto_approve);
        assert_eq!(config.rules.len(), 3);
        assert_eq!(
            config.rules[0].when,
            RuleCondition::CommandContains { text: "git push".into() }
        );
        assert_eq!(config.rules[1].decision, Decision::Deny);
        assert_eq!(config.rules[2].tool, "*");
        assert_eq!(config.rules[2].when, RuleCondition::Always);
    }
}
