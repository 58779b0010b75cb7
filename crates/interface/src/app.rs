//! Application lifecycle
//!
//! Three activities share one cancellation token:
//! - the UI loop ([`Ui::run`]), awaited on the caller's task
//! - the session: wait for the UI, initialize tools and provider, then the REPL
//! - the command handler for `list_models` / `switch_model`
//!
//! The UI is usable before the provider exists. When the UI loop returns the
//! token is cancelled and both background tasks are joined before
//! [`App::run`] returns.

use anyhow::Context;
use async_trait::async_trait;
use helm_core::{
    AgentError, AgentOrchestrator, AgentSettings, OrchestratorConfig, PolicyConfig, ProviderFactory,
    ReadyNotifier, ToolExecutor, ToolSettings, Ui, UiError, ready_signal,
};
use helm_runtime::{Confirmer, GuardedExecutor};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::commands::handle_commands;
use crate::repl::run_repl;

/// Builds the tool executor once the UI can answer confirmations
pub trait ExecutorFactory: Send + Sync {
    fn create(&self, confirmer: Arc<dyn Confirmer>) -> anyhow::Result<Arc<dyn ToolExecutor>>;
}

/// Guarded executor over a workspace directory
#[derive(Debug, Clone)]
pub struct WorkspaceExecutorFactory {
    root: PathBuf,
    tools: ToolSettings,
    policy: PolicyConfig,
}

impl WorkspaceExecutorFactory {
    pub fn new(root: PathBuf, tools: ToolSettings, policy: PolicyConfig) -> Self {
        Self {
            root,
            tools,
            policy,
        }
    }
}

impl ExecutorFactory for WorkspaceExecutorFactory {
    fn create(&self, confirmer: Arc<dyn Confirmer>) -> anyhow::Result<Arc<dyn ToolExecutor>> {
        let executor = GuardedExecutor::build(&self.root, &self.tools, &self.policy, confirmer)
            .with_context(|| format!("workspace {}", self.root.display()))?;
        Ok(Arc::new(executor))
    }
}

/// Policy confirmations answered through the UI
struct UiConfirmer {
    ui: Arc<dyn Ui>,
}

#[async_trait]
impl Confirmer for UiConfirmer {
    async fn confirm(&self, cancel: &CancellationToken, prompt: &str) -> Result<bool, String> {
        self.ui.confirm(cancel, prompt).await.map_err(|e| e.to_string())
    }
}

/// Result of background initialization, published once
#[derive(Clone)]
pub enum Backend {
    Ready(AgentOrchestrator),
    /// Initialization failed; every request gets the reason back
    Degraded(String),
}

impl Backend {
    pub fn degraded_message(reason: &str) -> String {
        format!("helm is running in degraded mode: {}", reason)
    }
}

/// Helm 应用
#[derive(Clone)]
pub struct App {
    ui: Arc<dyn Ui>,
    providers: Arc<dyn ProviderFactory>,
    executors: Arc<dyn ExecutorFactory>,
    agent: AgentSettings,
}

impl App {
    pub fn new(
        ui: Arc<dyn Ui>,
        providers: Arc<dyn ProviderFactory>,
        executors: Arc<dyn ExecutorFactory>,
        agent: AgentSettings,
    ) -> Self {
        Self {
            ui,
            providers,
            executors,
            agent,
        }
    }

    /// Run until the UI exits. `cancel` is cancelled on the way out.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), UiError> {
        let (notifier, backend) = ready_signal();
        let commands = self.ui.take_commands();

        let session = {
            let app = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { app.run_session(notifier, cancel).await })
        };
        let handler = tokio::spawn(handle_commands(
            self.ui.clone(),
            commands,
            backend,
            cancel.clone(),
        ));

        let result = self.ui.run(cancel.clone()).await;
        debug!("ui exited, shutting down");
        cancel.cancel();

        for (task, handle) in [("session", session), ("commands", handler)] {
            if let Err(e) = handle.await {
                warn!(task, error = %e, "background task ended abnormally");
            }
        }
        info!("shutdown complete");
        result
    }

    async fn run_session(self, notifier: ReadyNotifier<Backend>, cancel: CancellationToken) {
        let ui_ready = self.ui.ready();
        let ready = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            ready = ui_ready.wait() => ready,
        };
        if ready.is_none() {
            debug!("ui dropped its ready signal");
            return;
        }

        self.ui.write_status("Initializing...");
        let initialized = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            initialized = self.initialize() => initialized,
        };

        let backend = match initialized {
            Ok(orchestrator) => {
                let model = orchestrator.provider().model();
                info!(model = %model, "provider ready");
                self.ui.set_model(&model);
                Backend::Ready(orchestrator)
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                let error = AgentError::Initialization(reason.clone());
                warn!(error = %error, "entering degraded mode");
                self.ui.write_error(&error.to_string());
                Backend::Degraded(reason)
            }
        };
        notifier.notify(backend.clone());

        run_repl(self.ui.as_ref(), &backend, &cancel).await;
    }

    async fn initialize(&self) -> anyhow::Result<AgentOrchestrator> {
        let confirmer = Arc::new(UiConfirmer {
            ui: self.ui.clone(),
        });
        let executor = self.executors.create(confirmer)?;
        let provider = self
            .providers
            .create()
            .await
            .context("provider unavailable")?;

        Ok(AgentOrchestrator::new(
            provider,
            executor,
            self.ui.clone(),
            OrchestratorConfig::from(&self.agent),
        ))
    }
}
