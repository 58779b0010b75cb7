//! Helm Interface - 交互层
//!
//! 职责：
//! - cli: 命令行参数、日志与配置加载
//! - console: 行式终端 UI
//! - app: 应用生命周期 (UI / 初始化+REPL / 命令处理)
//! - provider_config: 从配置创建 LLM Provider

pub mod app;
pub mod cli;
pub mod console;
mod commands;
mod provider_config;
pub mod repl;

pub use app::{App, Backend, ExecutorFactory, WorkspaceExecutorFactory};
pub use cli::run_cli;
pub use console::ConsoleUi;
pub use provider_config::ConfiguredProviderFactory;
pub use repl::PROMPT;
