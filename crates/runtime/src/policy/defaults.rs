//! Built-in dangerous-command rules
//!
//! Each pattern carries a danger level; the level decides the rule's
//! decision. Patterns are regexes over the `run_shell` command line.

use helm_core::{Decision, PolicyRule, RuleCondition};

/// 危险等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DangerLevel {
    /// Reaches the network
    Network,
    Medium,
    High,
    /// Unrecoverable, never allowed
    Critical,
}

impl DangerLevel {
    pub fn decision(self) -> Decision {
        match self {
            Self::Critical => Decision::Deny,
            Self::High | Self::Medium | Self::Network => Decision::RequireConfirmation,
        }
    }
}

/// 危险命令模式
#[derive(Debug, Clone, Copy)]
pub struct DangerousPattern {
    pub regex: &'static str,
    pub level: DangerLevel,
    pub description: &'static str,
}

pub const DANGEROUS_PATTERNS: &[DangerousPattern] = &[
    DangerousPattern {
        regex: r"\brm\s+(-[a-zA-Z]+\s+)*/\*?(\s|$)",
        level: DangerLevel::Critical,
        description: "removes the root filesystem",
    },
    DangerousPattern {
        regex: r"\bmkfs(\.[a-z0-9]+)?\b",
        level: DangerLevel::Critical,
        description: "formats a filesystem",
    },
    DangerousPattern {
        regex: r"\bdd\s+if=/dev/(zero|random|urandom)\b",
        level: DangerLevel::Critical,
        description: "overwrites a device",
    },
    DangerousPattern {
        regex: r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
        level: DangerLevel::Critical,
        description: "fork bomb",
    },
    DangerousPattern {
        regex: r"\brm\s+-[a-zA-Z]*([rR][a-zA-Z]*f|f[a-zA-Z]*[rR])",
        level: DangerLevel::High,
        description: "recursive forced delete",
    },
    DangerousPattern {
        regex: r"\bchmod\s+-R\s+777\b",
        level: DangerLevel::High,
        description: "recursive world-writable permissions",
    },
    DangerousPattern {
        regex: r"\bchown\s+-R\b",
        level: DangerLevel::High,
        description: "recursive ownership change",
    },
    DangerousPattern {
        regex: r"\bsudo\b",
        level: DangerLevel::High,
        description: "runs as root",
    },
    DangerousPattern {
        regex: r"\bkill\s+-9\b",
        level: DangerLevel::Medium,
        description: "force-kills a process",
    },
    DangerousPattern {
        regex: r"\b(pkill|killall)\b",
        level: DangerLevel::Medium,
        description: "kills processes by name",
    },
    DangerousPattern {
        regex: r"\b(reboot|shutdown)\b",
        level: DangerLevel::Medium,
        description: "restarts or stops the machine",
    },
    DangerousPattern {
        regex: r"\b(curl|wget)\b",
        level: DangerLevel::Network,
        description: "fetches from the network",
    },
];

/// Default rule set: the pattern table plus the workspace boundary
pub fn default_rules() -> Vec<PolicyRule> {
    let mut rules: Vec<PolicyRule> = DANGEROUS_PATTERNS
        .iter()
        .map(|pattern| {
            PolicyRule::new(
                "run_shell",
                RuleCondition::CommandMatches {
                    regex: pattern.regex.to_string(),
                },
                pattern.level.decision(),
            )
            .with_reason(pattern.description)
        })
        .collect();

    rules.push(
        PolicyRule::new("*", RuleCondition::PathOutsideWorkspace, Decision::Deny)
            .with_reason("path is outside the workspace"),
    );
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn level_of(command: &str) -> Option<DangerLevel> {
        DANGEROUS_PATTERNS
            .iter()
            .filter(|p| Regex::new(p.regex).unwrap().is_match(command))
            .map(|p| p.level)
            .max()
    }

    #[test]
    fn test_patterns_compile() {
        for pattern in DANGEROUS_PATTERNS {
            assert!(Regex::new(pattern.regex).is_ok(), "{}", pattern.regex);
        }
    }

    #[test]
    fn test_levels() {
        assert_eq!(level_of("rm -rf /"), Some(DangerLevel::Critical));
        assert_eq!(level_of("sudo rm -rf / "), Some(DangerLevel::Critical));
        assert_eq!(level_of("rm -rf /*"), Some(DangerLevel::Critical));
        assert_eq!(level_of("mkfs.ext4 /dev/sdb1"), Some(DangerLevel::Critical));
        assert_eq!(level_of("dd if=/dev/zero of=/dev/sda"), Some(DangerLevel::Critical));
        assert_eq!(level_of(":(){ :|:& };:"), Some(DangerLevel::Critical));

        assert_eq!(level_of("rm -rf build/"), Some(DangerLevel::High));
        assert_eq!(level_of("rm -fr /tmp/x"), Some(DangerLevel::High));
        assert_eq!(level_of("chmod -R 777 ."), Some(DangerLevel::High));
        assert_eq!(level_of("kill -9 1234"), Some(DangerLevel::Medium));
        assert_eq!(level_of("curl https://example.com"), Some(DangerLevel::Network));

        assert_eq!(level_of("ls -la"), None);
        assert_eq!(level_of("rm notes.txt"), None);
        assert_eq!(level_of("cargo build"), None);
    }

    #[test]
    fn test_default_rules_include_boundary() {
        let rules = default_rules();
        assert_eq!(rules.len(), DANGEROUS_PATTERNS.len() + 1);
        assert!(rules
            .iter()
            .any(|r| r.when == RuleCondition::PathOutsideWorkspace && r.decision == Decision::Deny));
    }
}
