//! 共享基础设施
//!
//! 配置加载与日志初始化，供规则引擎的可执行程序复用。

pub mod config;
pub mod logging;

pub use config::{AppConfig, CompilerConfig, LogConfig};
