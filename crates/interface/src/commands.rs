//! Out-of-band command handler
//!
//! Serves `list_models` / `switch_model` independently of the goal loop.
//! Commands issued before the provider is ready wait for it.

use helm_core::{ReadySignal, Ui, UiCommand};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::app::Backend;

pub(crate) async fn handle_commands(
    ui: Arc<dyn Ui>,
    commands: Option<mpsc::Receiver<UiCommand>>,
    backend: ReadySignal<Backend>,
    cancel: CancellationToken,
) {
    let Some(mut commands) = commands else {
        debug!("ui provides no command stream");
        return;
    };

    loop {
        let command = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            command = commands.recv() => command,
        };
        let Some(command) = command else {
            break;
        };

        let ready = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            ready = backend.wait() => ready,
        };
        let Some(ready) = ready else {
            debug!(command = command.kind(), "session ended before initialization");
            break;
        };

        handle_command(ui.as_ref(), &ready, command, &cancel).await;
    }
    debug!("command handler finished");
}

async fn handle_command(
    ui: &dyn Ui,
    backend: &Backend,
    command: UiCommand,
    cancel: &CancellationToken,
) {
    let provider = match backend {
        Backend::Ready(orchestrator) => orchestrator.provider(),
        Backend::Degraded(reason) => {
            ui.write_error(&Backend::degraded_message(reason));
            return;
        }
    };

    match command {
        UiCommand::ListModels => {
            let models = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                models = provider.list_models() => models,
            };
            match models {
                Ok(models) => ui.write_model_list(&models, &provider.model()),
                Err(e) => ui.write_error(&format!("Failed to list models: {}", e)),
            }
        }
        UiCommand::SwitchModel { model } => match provider.set_model(&model) {
            Ok(()) => {
                info!(model = %model, "model switched");
                ui.set_model(&model);
            }
            Err(e) => ui.write_error(&format!("Failed to switch model: {}", e)),
        },
    }
}
