//! UI capability set
//!
//! The runtime never renders anything itself; it talks to whatever front end
//! implements [`Ui`].

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::signal::ReadySignal;

/// Out-of-band command raised by the UI, outside the goal loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    ListModels,
    SwitchModel { model: String },
}

impl UiCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ListModels => "list_models",
            Self::SwitchModel { .. } => "switch_model",
        }
    }
}

#[derive(Debug, Error)]
pub enum UiError {
    #[error("cancelled")]
    Cancelled,

    #[error("ui closed")]
    Closed,

    #[error("ui io error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait Ui: Send + Sync {
    /// Fires once the UI can accept output
    fn ready(&self) -> ReadySignal<()>;

    /// Next line of user input. `Ok(None)` on end of input.
    async fn read_input(
        &self,
        cancel: &CancellationToken,
        prompt: &str,
    ) -> Result<Option<String>, UiError>;

    /// Blocking yes/no round-trip
    async fn confirm(&self, cancel: &CancellationToken, prompt: &str) -> Result<bool, UiError>;

    fn write_message(&self, text: &str);

    fn write_status(&self, text: &str);

    fn write_error(&self, text: &str);

    fn set_model(&self, model: &str);

    fn write_model_list(&self, models: &[String], current: &str);

    /// Command stream. Handed out once; later calls return `None`.
    fn take_commands(&self) -> Option<mpsc::Receiver<UiCommand>>;

    /// Render/input loop. Returns when the user quits or `cancel` fires.
    async fn run(&self, cancel: CancellationToken) -> Result<(), UiError>;
}
