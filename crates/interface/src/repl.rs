//! REPL - 交互式对话模式
//!
//! Reads goals from the UI and runs the orchestrator once per goal. Goal
//! failures are reported through the UI and the loop carries on; only
//! cancellation or the end of input stops it.

use helm_core::{AgentError, Ui, UiError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::app::Backend;

/// 提示符
pub const PROMPT: &str = "helm> ";

/// 运行 REPL
pub(crate) async fn run_repl(ui: &dyn Ui, backend: &Backend, cancel: &CancellationToken) {
    loop {
        let input = match ui.read_input(cancel, PROMPT).await {
            Ok(Some(input)) => input,
            Ok(None) => {
                debug!("input closed");
                break;
            }
            Err(UiError::Cancelled) => break,
            Err(e) => {
                warn!(error = %e, "reading input failed");
                break;
            }
        };

        let goal = input.trim();
        if goal.is_empty() {
            continue;
        }

        let orchestrator = match backend {
            Backend::Ready(orchestrator) => orchestrator,
            Backend::Degraded(reason) => {
                ui.write_error(&Backend::degraded_message(reason));
                continue;
            }
        };

        match orchestrator.run(cancel, goal).await {
            Ok(outcome) => debug!(rounds = outcome.rounds, "goal complete"),
            Err(AgentError::Cancelled) => {
                ui.write_status("Goal cancelled.");
                break;
            }
            Err(e) => ui.write_error(&e.to_string()),
        }
    }
    debug!("repl finished");
}
