//! 通道帧协议定义
//!
//! 建议通道：
//! - 客户端 → 服务端：`{"action":"get_suggestion"}`、`{"action":"accept_suggestion","suggestion":{..}}`
//! - 服务端 → 客户端：建议载荷 `{content, replacement, reason}`（无 id）、`{end:true, message}`、`{error}`
//!
//! 文档通道只有服务端推送全文；日志通道推送 `{log}`。

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 建议载荷（服务端不带 id，由客户端分配）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionPayload {
    pub content: String,
    pub replacement: String,
    #[serde(default)]
    pub reason: String,
}

/// 客户端 → 服务端
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientFrame {
    GetSuggestion,
    AcceptSuggestion { suggestion: SuggestionPayload },
}

/// 服务端 → 客户端（建议通道）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    Suggestion(SuggestionPayload),
    End { message: String },
    Error { message: String },
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("End marker without end=true")]
    FalseEnd,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawServerFrame {
    End {
        end: bool,
        #[serde(default)]
        message: Option<String>,
    },
    Error {
        error: String,
    },
    Suggestion(SuggestionPayload),
}

/// 解析建议通道的服务端帧
pub fn decode_server_frame(text: &str) -> Result<ServerFrame, FrameError> {
    match serde_json::from_str::<RawServerFrame>(text)? {
        RawServerFrame::End { end: true, message } => Ok(ServerFrame::End {
            message: message.unwrap_or_default(),
        }),
        RawServerFrame::End { end: false, .. } => Err(FrameError::FalseEnd),
        RawServerFrame::Error { error } => Ok(ServerFrame::Error { message: error }),
        RawServerFrame::Suggestion(payload) => Ok(ServerFrame::Suggestion(payload)),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPush {
    Object { content: String },
    Text(String),
}

/// 解析文档全文推送：`{"content": ..}`、JSON 字符串，或原样文本
pub fn decode_document_push(text: &str) -> String {
    match serde_json::from_str::<RawPush>(text) {
        Ok(RawPush::Object { content }) => content,
        Ok(RawPush::Text(content)) => content,
        Err(_) => text.to_string(),
    }
}

#[derive(Deserialize)]
struct LogFrame {
    log: String,
}

/// 解析日志通道帧；非 `{log}` 形状返回 None
pub fn decode_log_line(text: &str) -> Option<String> {
    serde_json::from_str::<LogFrame>(text).ok().map(|f| f.log)
}
