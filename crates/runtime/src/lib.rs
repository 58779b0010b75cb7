//! Helm Runtime - 受控工具执行
//!
//! 职责：
//! - 工具集 (文件、搜索、Shell、任务列表)
//! - 工作区边界、内容摘要、原子写入
//! - 策略门禁
//!
//! 架构：
//! - tools/: 工具适配器与内置工具
//! - policy/: 规则评估与用户确认
//! - executor: 组合二者, 实现 [`helm_core::ToolExecutor`]

pub mod executor;
pub mod policy;
pub mod tools;

pub use executor::{GuardedExecutor, SetupError};
pub use policy::{Confirmer, FixedConfirmer, PolicyError, PolicyService, Verdict, describe_call};
pub use tools::{
    BUILTIN_TOOLS, ChecksumStore, Tool, ToolAdapter, ToolContext, ToolEnv, ToolError, Workspace,
    builtin_tools,
};
