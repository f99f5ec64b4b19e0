//! Redline - 多人物文档审阅客户端
//!
//! 模块划分：
//! - **channel**: 传输通道（地址、WebSocket / 内存连接器、帧编解码）
//! - **document**: 文档视图（全文推送 + 本地乐观替换）
//! - **session**: 建议会话状态机、调和引擎、词级 diff
//! - **logs**: 实时日志视图
//! - **core**: 审阅错误、状态投影、审阅台与主控循环
//! - **api**: 后端 HTTP 接口（人物列表、上传、重启）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **observability**: 日志初始化
//! - **ui**: Ratatui TUI 界面

pub mod api;
pub mod channel;
pub mod config;
pub mod core;
pub mod document;
pub mod logs;
pub mod observability;
pub mod session;
pub mod ui;
