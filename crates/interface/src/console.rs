//! Console UI - 行式终端界面
//!
//! A reader thread forwards stdin lines; `run` routes them:
//! - `/models`, `/model <name>` become [`UiCommand`]s
//! - `/help` prints the command list, `/quit` ends the UI
//! - at EOF the UI ends once the REPL has drained the queued lines
//! - anything else is input for the REPL or a pending confirmation

use async_trait::async_trait;
use crossterm::style::Stylize;
use crossterm::tty::IsTty;
use helm_core::{ReadyNotifier, ReadySignal, Ui, UiCommand, UiError, ready_signal};
use std::io::{BufRead, BufReader, Write};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const HELP: &str = "\
Commands:
  /models         list available models
  /model <name>   switch the active model
  /help           show this help
  /quit           exit (Ctrl-D works too)
Anything else is sent to the agent as a goal.";

/// One routed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Line {
    Quit,
    Help,
    Command(UiCommand),
    Usage(String),
    Input(String),
}

pub(crate) fn parse_line(line: &str) -> Line {
    let trimmed = line.trim();
    let Some(command) = trimmed.strip_prefix('/') else {
        return Line::Input(trimmed.to_string());
    };

    let mut parts = command.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("quit" | "exit"), _) => Line::Quit,
        (Some("help"), _) => Line::Help,
        (Some("models"), _) => Line::Command(UiCommand::ListModels),
        (Some("model"), Some(name)) => Line::Command(UiCommand::SwitchModel {
            model: name.to_string(),
        }),
        (Some("model"), None) => Line::Usage("usage: /model <name>".to_string()),
        _ => Line::Usage(format!("unknown command: {}; type /help", trimmed)),
    }
}

#[derive(Debug, Clone, Copy)]
enum Tone {
    Plain,
    Status,
    Error,
    Prompt,
}

/// 终端界面
pub struct ConsoleUi {
    ready: ReadySignal<()>,
    notifier: Mutex<Option<ReadyNotifier<()>>>,
    source: Mutex<Option<Box<dyn BufRead + Send>>>,
    out: Mutex<Box<dyn Write + Send>>,
    styled: bool,
    /// Dropped at end of input so readers drain the queue and then see `None`
    inputs_tx: Mutex<Option<mpsc::Sender<String>>>,
    inputs: tokio::sync::Mutex<mpsc::Receiver<String>>,
    /// Fired once a reader has seen the end of the queue
    drained: CancellationToken,
    commands_tx: mpsc::Sender<UiCommand>,
    commands: Mutex<Option<mpsc::Receiver<UiCommand>>>,
    model: Mutex<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl ConsoleUi {
    /// stdin/stdout, colored when stdout is a terminal
    pub fn stdio() -> Self {
        let styled = std::io::stdout().is_tty();
        let mut ui = Self::with_io(
            Box::new(BufReader::new(std::io::stdin())),
            Box::new(std::io::stdout()),
        );
        ui.styled = styled;
        ui
    }

    pub fn with_io(source: Box<dyn BufRead + Send>, out: Box<dyn Write + Send>) -> Self {
        let (notifier, ready) = ready_signal();
        let (inputs_tx, inputs) = mpsc::channel(16);
        let (commands_tx, commands) = mpsc::channel(16);
        Self {
            ready,
            notifier: Mutex::new(Some(notifier)),
            source: Mutex::new(Some(source)),
            out: Mutex::new(out),
            styled: false,
            inputs_tx: Mutex::new(Some(inputs_tx)),
            inputs: tokio::sync::Mutex::new(inputs),
            drained: CancellationToken::new(),
            commands_tx,
            commands: Mutex::new(Some(commands)),
            model: Mutex::new(String::new()),
        }
    }

    pub fn model(&self) -> String {
        lock(&self.model).clone()
    }

    fn paint(&self, text: &str, tone: Tone) -> String {
        if !self.styled {
            return text.to_string();
        }
        match tone {
            Tone::Plain => text.to_string(),
            Tone::Status => text.dark_grey().to_string(),
            Tone::Error => text.red().to_string(),
            Tone::Prompt => text.cyan().bold().to_string(),
        }
    }

    fn emit(&self, text: &str, tone: Tone, newline: bool) {
        let painted = self.paint(text, tone);
        let mut out = lock(&self.out);
        let result = if newline {
            writeln!(out, "{}", painted)
        } else {
            write!(out, "{}", painted)
        };
        if let Err(e) = result.and_then(|_| out.flush()) {
            debug!(error = %e, "console write failed");
        }
    }

    async fn next_line(&self, cancel: &CancellationToken) -> Result<Option<String>, UiError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(UiError::Cancelled),
            line = async {
                let mut inputs = self.inputs.lock().await;
                inputs.recv().await
            } => Ok(line),
        }
    }

    /// Forward a line to whoever reads input; `false` when shutting down
    async fn forward(&self, cancel: &CancellationToken, text: String) -> bool {
        let Some(inputs_tx) = lock(&self.inputs_tx).clone() else {
            return false;
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            sent = inputs_tx.send(text) => sent.is_ok(),
        }
    }
}

fn read_lines(source: Box<dyn BufRead + Send>, tx: mpsc::Sender<String>) {
    for line in source.lines() {
        let Ok(line) = line else {
            break;
        };
        if tx.blocking_send(line).is_err() {
            break;
        }
    }
    debug!("input reader finished");
}

#[async_trait]
impl Ui for ConsoleUi {
    fn ready(&self) -> ReadySignal<()> {
        self.ready.clone()
    }

    async fn read_input(
        &self,
        cancel: &CancellationToken,
        prompt: &str,
    ) -> Result<Option<String>, UiError> {
        self.emit(prompt, Tone::Prompt, false);
        let line = self.next_line(cancel).await?;
        if line.is_none() {
            self.drained.cancel();
        }
        Ok(line)
    }

    async fn confirm(&self, cancel: &CancellationToken, prompt: &str) -> Result<bool, UiError> {
        self.emit(&format!("{} [y/N] ", prompt), Tone::Prompt, false);
        match self.next_line(cancel).await? {
            Some(answer) => Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")),
            None => Err(UiError::Closed),
        }
    }

    fn write_message(&self, text: &str) {
        self.emit(text, Tone::Plain, true);
    }

    fn write_status(&self, text: &str) {
        self.emit(text, Tone::Status, true);
    }

    fn write_error(&self, text: &str) {
        self.emit(text, Tone::Error, true);
    }

    fn set_model(&self, model: &str) {
        *lock(&self.model) = model.to_string();
        self.write_status(&format!("model: {}", model));
    }

    fn write_model_list(&self, models: &[String], current: &str) {
        if models.is_empty() {
            self.write_status("no models available");
            return;
        }
        let listing: Vec<String> = models
            .iter()
            .map(|m| {
                let marker = if m == current { "*" } else { " " };
                format!("{} {}", marker, m)
            })
            .collect();
        self.write_message(&listing.join("\n"));
    }

    fn take_commands(&self) -> Option<mpsc::Receiver<UiCommand>> {
        lock(&self.commands).take()
    }

    async fn run(&self, cancel: CancellationToken) -> Result<(), UiError> {
        let source = lock(&self.source).take().ok_or(UiError::Closed)?;
        let (line_tx, mut lines) = mpsc::channel(16);
        std::thread::Builder::new()
            .name("helm-input".to_string())
            .spawn(move || read_lines(source, line_tx))?;

        self.write_status("helm ready. Type /help for commands.");
        if let Some(notifier) = lock(&self.notifier).take() {
            notifier.notify(());
        }

        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                line = lines.recv() => line,
            };
            let Some(line) = line else {
                // queued goals still run; stop once the reader has drained them
                debug!("end of input");
                lock(&self.inputs_tx).take();
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = self.drained.cancelled() => {}
                }
                break;
            };

            match parse_line(&line) {
                Line::Quit => break,
                Line::Help => self.write_message(HELP),
                Line::Usage(message) => self.write_error(&message),
                Line::Command(command) => {
                    debug!(command = command.kind(), "command issued");
                    if self.commands_tx.send(command).await.is_err() {
                        self.write_error("commands are unavailable");
                    }
                }
                Line::Input(text) => {
                    if !self.forward(&cancel, text).await {
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}
