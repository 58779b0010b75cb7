//! CLI - Command Line Interface
//!
//! `helm [--workspace DIR] [--config FILE] [--model NAME] [--auto-approve] [-v]`
//!
//! Starts the console UI immediately; the provider and tools come up in the
//! background.

use anyhow::Context;
use clap::Parser;
use helm_core::HelmConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::app::{App, WorkspaceExecutorFactory};
use crate::console::ConsoleUi;
use crate::provider_config::ConfiguredProviderFactory;

/// Helm CLI
#[derive(Parser, Debug)]
#[command(name = "helm")]
#[command(author, version, about = "Interactive coding agent for a local workspace", long_about = None)]
pub(crate) struct Cli {
    /// Workspace root (defaults to the current directory)
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// Config file (defaults to the user config file)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model override
    #[arg(short, long)]
    model: Option<String>,

    /// Run confirmable tool calls without asking
    #[arg(long)]
    auto_approve: bool,

    /// Verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Config file plus flag overrides
    fn load_config(&self) -> anyhow::Result<HelmConfig> {
        let mut config = HelmConfig::load(self.config.as_deref())?;
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if self.auto_approve {
            config.policy.auto_approve = true;
        }
        config.agent.validate()?;
        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    if !verbose {
        return;
    }
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::DEBUG)
        .init();
}

/// Run CLI
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.load_config()?;
    let workspace = match &cli.workspace {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("cannot determine current directory")?,
    };
    info!(workspace = %workspace.display(), model = %config.llm.model, "starting helm");
    debug!(config = ?config, "configuration loaded");

    let ui = Arc::new(ConsoleUi::stdio());
    let app = App::new(
        ui,
        Arc::new(ConfiguredProviderFactory::new(config.llm.clone())),
        Arc::new(WorkspaceExecutorFactory::new(
            workspace,
            config.tools.clone(),
            config.policy.clone(),
        )),
        config.agent.clone(),
    );

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                signal = tokio::signal::ctrl_c() => {
                    if signal.is_ok() {
                        debug!("interrupted");
                    }
                    cancel.cancel();
                }
            }
        })
    };

    let result = app.run(cancel).await;
    if let Err(e) = interrupt.await {
        debug!(error = %e, "interrupt watcher ended abnormally");
    }
    result?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "helm",
            "-w",
            "/tmp/project",
            "--model",
            "gpt-4o",
            "--auto-approve",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.workspace, Some(PathBuf::from("/tmp/project")));
        assert_eq!(cli.model.as_deref(), Some("gpt-4o"));
        assert!(cli.auto_approve);
        assert!(cli.verbose);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_flags_override_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "llm:\n  model: from-file\npolicy:\n  auto_approve: false\nagent:\n  max_rounds: 10\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "helm",
            "--config",
            path.to_str().unwrap(),
            "--model",
            "from-flag",
            "--auto-approve",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();
        assert_eq!(config.agent.max_rounds, 10);
        assert!(config.policy.auto_approve);
        // HELM_MODEL may be set in the environment; the flag wins either way
        assert_eq!(config.llm.model, "from-flag");
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let cli = Cli::try_parse_from([
            "helm",
            "--config",
            temp_dir.path().join("nope.yaml").to_str().unwrap(),
        ])
        .unwrap();
        assert!(cli.load_config().is_err());
    }

    #[test]
    fn test_invalid_round_ceiling_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(&path, "agent:\n  max_rounds: 0\n").unwrap();
        let cli = Cli::try_parse_from(["helm", "-c", path.to_str().unwrap()]).unwrap();
        assert!(cli.load_config().is_err());
    }
}
