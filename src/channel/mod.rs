//! 传输通道：按逻辑地址建立的双向、有序、基于消息的连接
//!
//! - **Address**：文档通道 / 建议通道 / 日志通道
//! - **Channel**：拥有型句柄，`close` 幂等，Drop 时自动关闭（先关后开即所有权转移）
//! - **Connector**：打开通道的接缝；`WsConnector` 走 WebSocket，`MemoryConnector` 供测试
//!
//! 所有入站事件汇入同一个 `ChannelEvent` 队列，按 `ChannelId` 标记；
//! 通道本身不做重连，由持有者（文档视图、建议会话）决定。

mod address;
mod endpoint;
pub mod frame;
mod memory;
mod ws;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use address::{Address, DocId, Persona};
pub use endpoint::Endpoints;
pub use memory::MemoryConnector;
pub use ws::WsConnector;

/// 通道 ID（由 Connector 单调分配，用于识别过期事件）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ch#{}", self.0)
    }
}

/// 通道错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Channel closed")]
    Closed,

    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// 入站事件种类（对应 onOpen / onMessage / onClose / onError）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEventKind {
    Opened,
    Message(String),
    Closed,
    Error(String),
}

/// 带通道 ID 的入站事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEvent {
    pub channel: ChannelId,
    pub kind: ChannelEventKind,
}

impl ChannelEvent {
    pub fn new(channel: ChannelId, kind: ChannelEventKind) -> Self {
        Self { channel, kind }
    }

    pub fn opened(channel: ChannelId) -> Self {
        Self::new(channel, ChannelEventKind::Opened)
    }

    pub fn message(channel: ChannelId, text: impl Into<String>) -> Self {
        Self::new(channel, ChannelEventKind::Message(text.into()))
    }

    pub fn closed(channel: ChannelId) -> Self {
        Self::new(channel, ChannelEventKind::Closed)
    }

    pub fn error(channel: ChannelId, error: &ChannelError) -> Self {
        Self::new(channel, ChannelEventKind::Error(error.to_string()))
    }
}

/// 连接状态（由持有者根据事件推导）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Connecting,
    Open,
    Disconnected,
}

impl LinkState {
    /// 根据入站事件更新连接状态；Message 不改变状态
    pub fn observe(&mut self, kind: &ChannelEventKind) {
        match kind {
            ChannelEventKind::Opened => *self = LinkState::Open,
            ChannelEventKind::Closed | ChannelEventKind::Error(_) => {
                *self = LinkState::Disconnected
            }
            ChannelEventKind::Message(_) => {}
        }
    }

    pub fn is_open(self) -> bool {
        self == LinkState::Open
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkState::Connecting => write!(f, "connecting"),
            LinkState::Open => write!(f, "connected"),
            LinkState::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// 通道句柄：同一时刻只归一个组件所有，Drop 即关闭
#[derive(Debug)]
pub struct Channel {
    id: ChannelId,
    address: Address,
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl Channel {
    pub fn new(
        id: ChannelId,
        address: Address,
        outbound: mpsc::UnboundedSender<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            address,
            outbound,
            cancel,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// 发送一帧文本；通道已关闭或后台任务已退出时返回 Closed
    pub fn send(&self, frame: String) -> Result<(), ChannelError> {
        if self.cancel.is_cancelled() {
            return Err(ChannelError::Closed);
        }
        self.outbound.send(frame).map_err(|_| ChannelError::Closed)
    }

    /// 序列化为 JSON 后发送
    pub fn send_json<T: Serialize>(&self, frame: &T) -> Result<(), ChannelError> {
        let text =
            serde_json::to_string(frame).map_err(|e| ChannelError::Transport(e.to_string()))?;
        tracing::debug!(channel = %self.id, frame = %text, "Sending frame");
        self.send(text)
    }

    /// 关闭通道（幂等：重复关闭不报错）
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!(channel = %self.id, address = %self.address, "Closing channel");
            self.cancel.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close();
    }
}

/// 打开通道的接缝：调用即发起连接，结果通过事件队列返回
pub trait Connector: Send {
    fn open(&mut self, address: &Address) -> Channel;
}
