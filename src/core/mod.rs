//! 核心层：审阅错误、状态投影、审阅台与主控循环

pub mod controller;
pub mod desk;
pub mod error;
pub mod state;

pub use controller::{run_desk, spawn_desk, Command};
pub use desk::{DeskOptions, ReviewDesk};
pub use error::ReviewError;
pub use state::{
    DeskSnapshot, DocumentSnapshot, LogSnapshot, Notice, NoticeLevel, Notification,
    NotificationCenter, SessionPhase, SessionSnapshot, SuggestionCard,
};
