//! Shell Tool - Shell 命令执行
//!
//! 安全措施：
//! - 工作目录限制在工作区内
//! - 超时限制, 超时或取消时终止子进程
//! - 输出截断
//!
//! Whether a command may run at all is decided by the policy service before
//! the tool is invoked.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::schema::{ToolSchema, ToolSchemaBuilder};
use super::{Tool, ToolContext, ToolEnv, ToolError, Workspace};

/// A fully resolved command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub command: String,
    pub workdir: PathBuf,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// None when the process was killed or ended by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

/// Process runner seam, replaced in tests
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, cancel: &CancellationToken, spec: CommandSpec) -> Result<CommandOutput, ToolError>;
}

/// `sh -c` runner
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, cancel: &CancellationToken, spec: CommandSpec) -> Result<CommandOutput, ToolError> {
        let child = Command::new("sh")
            .arg("-c")
            .arg(&spec.command)
            .current_dir(&spec.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        debug!(command = %spec.command, pid = ?child.id(), "process spawned");

        // dropping the wait future drops the child, which kills it
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(command = %spec.command, "command cancelled");
                Err(ToolError::Cancelled(format!("command interrupted: {}", spec.command)))
            }
            result = tokio::time::timeout(spec.timeout, child.wait_with_output()) => match result {
                Ok(output) => {
                    let output = output?;
                    Ok(CommandOutput {
                        exit_code: output.status.code(),
                        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                        timed_out: false,
                    })
                }
                Err(_) => {
                    warn!(command = %spec.command, timeout_secs = spec.timeout.as_secs(), "command timed out");
                    Ok(CommandOutput {
                        exit_code: None,
                        stdout: String::new(),
                        stderr: format!("command timed out after {}s", spec.timeout.as_secs()),
                        timed_out: true,
                    })
                }
            },
        }
    }
}

/// Keep the first `max_chars` characters, noting how many were dropped
pub fn truncate_output(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let dropped = text[idx..].chars().count();
            format!("{}\n... [truncated {} chars]", &text[..idx], dropped)
        }
        None => text,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunShellRequest {
    pub command: String,
    pub timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunShellResponse {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

/// Shell 工具
pub struct RunShellTool {
    workspace: Workspace,
    runner: Arc<dyn CommandRunner>,
    default_timeout_secs: u64,
    max_output_chars: usize,
}

impl RunShellTool {
    pub fn new(env: &ToolEnv) -> Self {
        Self {
            workspace: env.workspace.clone(),
            runner: env.runner.clone(),
            default_timeout_secs: env.settings.shell_timeout_secs,
            max_output_chars: env.settings.max_output_chars,
        }
    }
}

#[async_trait]
impl Tool for RunShellTool {
    type Request = RunShellRequest;
    type Response = RunShellResponse;

    fn name(&self) -> &'static str {
        "run_shell"
    }

    fn description(&self) -> &'static str {
        "Run a shell command with sh -c in the workspace. Returns exit code, stdout and stderr."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchemaBuilder::new()
            .required_string("command", "Command line to run")
            .integer_default("timeout_secs", "Kill the command after this many seconds", self.default_timeout_secs)
            .param_string("workdir", "Working directory, relative to the workspace root")
            .build()
    }

    async fn run(
        &self,
        ctx: &ToolContext,
        request: RunShellRequest,
    ) -> Result<RunShellResponse, ToolError> {
        if request.command.trim().is_empty() {
            return Err(ToolError::invalid("command", "must not be empty"));
        }
        if request.timeout_secs == 0 {
            return Err(ToolError::invalid("timeout_secs", "must be at least 1"));
        }

        let workdir = match request.workdir.as_deref() {
            Some(dir) => self
                .workspace
                .resolve(dir)
                .map_err(|e| match e {
                    ToolError::InvalidArguments { reason, .. } => ToolError::invalid("workdir", reason),
                    other => other,
                })?,
            None => self.workspace.root().to_path_buf(),
        };
        if !workdir.is_dir() {
            return Err(ToolError::invalid("workdir", "not a directory"));
        }

        let spec = CommandSpec {
            command: request.command,
            workdir,
            timeout: Duration::from_secs(request.timeout_secs),
        };
        let output = self.runner.run(&ctx.cancel, spec).await?;

        Ok(RunShellResponse {
            exit_code: output.exit_code,
            stdout: truncate_output(output.stdout, self.max_output_chars),
            stderr: truncate_output(output.stderr, self.max_output_chars),
            timed_out: output.timed_out,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::env;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records specs, answers with a canned output
    struct FakeRunner {
        seen: Mutex<Vec<CommandSpec>>,
        output: CommandOutput,
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, _cancel: &CancellationToken, spec: CommandSpec) -> Result<CommandOutput, ToolError> {
            self.seen.lock().unwrap().push(spec);
            Ok(self.output.clone())
        }
    }

    fn request(command: &str) -> RunShellRequest {
        RunShellRequest {
            command: command.to_string(),
            timeout_secs: 5,
            workdir: None,
        }
    }

    #[test]
    fn test_truncate_output() {
        assert_eq!(truncate_output("short".to_string(), 10), "short");
        assert_eq!(
            truncate_output("abcdefgh".to_string(), 3),
            "abc\n... [truncated 5 chars]"
        );
        // char boundaries, not bytes
        assert_eq!(truncate_output("ééé".to_string(), 2), "éé\n... [truncated 1 chars]");
    }

    #[tokio::test]
    async fn test_runner_receives_resolved_spec() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("sub")).unwrap();
        let runner = Arc::new(FakeRunner {
            seen: Mutex::new(Vec::new()),
            output: CommandOutput {
                exit_code: Some(0),
                stdout: "x".repeat(50),
                ..Default::default()
            },
        });
        let mut env = env(&temp_dir).with_runner(runner.clone());
        env.settings.max_output_chars = 10;
        let tool = RunShellTool::new(&env);

        let mut req = request("make");
        req.workdir = Some("sub".to_string());
        let result = tool.run(&ToolContext::default(), req).await.unwrap();

        assert!(result.stdout.starts_with("xxxxxxxxxx\n... [truncated 40 chars]"));
        let seen = runner.seen.lock().unwrap();
        assert_eq!(seen[0].workdir, env.workspace.root().join("sub"));
        assert_eq!(seen[0].timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_workdir_outside_workspace_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let tool = RunShellTool::new(&env(&temp_dir));

        let mut req = request("ls");
        req.workdir = Some("..".to_string());
        let err = tool.run(&ToolContext::default(), req).await.unwrap_err();
        assert!(matches!(err, ToolError::OutsideWorkspace(_)));
    }

    #[tokio::test]
    async fn test_empty_command_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let tool = RunShellTool::new(&env(&temp_dir));

        let err = tool.run(&ToolContext::default(), request("   ")).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { field, .. } if field == "command"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_captures_output() {
        let temp_dir = TempDir::new().unwrap();
        let spec = CommandSpec {
            command: "echo out; echo err >&2; exit 3".to_string(),
            workdir: temp_dir.path().to_path_buf(),
            timeout: Duration::from_secs(10),
        };

        let output = SystemRunner.run(&CancellationToken::new(), spec).await.unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert!(!output.timed_out);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_timeout() {
        let temp_dir = TempDir::new().unwrap();
        let spec = CommandSpec {
            command: "sleep 5".to_string(),
            workdir: temp_dir.path().to_path_buf(),
            timeout: Duration::from_millis(100),
        };

        let output = SystemRunner.run(&CancellationToken::new(), spec).await.unwrap();
        assert!(output.timed_out);
        assert_eq!(output.exit_code, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_cancel() {
        let temp_dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let spec = CommandSpec {
            command: "sleep 5".to_string(),
            workdir: temp_dir.path().to_path_buf(),
            timeout: Duration::from_secs(30),
        };

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = SystemRunner.run(&cancel, spec).await.unwrap_err();
        assert!(matches!(err, ToolError::Cancelled(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
