//! 审阅错误类型
//!
//! 所有错误都在观察到它的组件内转换为用户通知，不会向上传播为致命错误。

use thiserror::Error;

use crate::session::SuggestionId;

/// 审阅操作可能出现的错误（连接不可用、重复请求、建议已耗尽等）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReviewError {
    #[error("Connection unavailable")]
    ConnectionUnavailable,

    #[error("A suggestion request is already in flight")]
    RequestInFlight,

    #[error("No more suggestions for this persona and document")]
    Exhausted,

    #[error("No persona and document selected")]
    NoSession,

    #[error("Unknown suggestion: {0}")]
    UnknownSuggestion(SuggestionId),

    /// 建议未处于编辑模式，不能修改草稿
    #[error("Suggestion {0} is not being edited")]
    NotEditing(SuggestionId),
}
