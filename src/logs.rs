//! 实时日志视图：订阅服务端日志通道，按行追加
//!
//! 重连会清空已收到的行；缓冲区有上限，超出时丢弃最旧的行。

use std::collections::VecDeque;

use crate::channel::{
    frame::decode_log_line, Address, Channel, ChannelEventKind, ChannelId, Connector, LinkState,
};
use crate::core::Notice;

#[derive(Debug)]
pub struct LogView {
    channel: Option<Channel>,
    link: LinkState,
    lines: VecDeque<String>,
    max_lines: usize,
}

impl LogView {
    pub fn open(connector: &mut dyn Connector, max_lines: usize) -> Self {
        Self {
            channel: Some(connector.open(&Address::Logs)),
            link: LinkState::Connecting,
            lines: VecDeque::new(),
            max_lines: max_lines.max(1),
        }
    }

    pub fn channel_id(&self) -> Option<ChannelId> {
        self.channel.as_ref().map(Channel::id)
    }

    pub fn link(&self) -> LinkState {
        self.link
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn reconnect(&mut self, connector: &mut dyn Connector) {
        if let Some(channel) = self.channel.take() {
            channel.close();
        }
        self.lines.clear();
        self.channel = Some(connector.open(&Address::Logs));
        self.link = LinkState::Connecting;
    }

    pub fn on_event(&mut self, kind: ChannelEventKind) -> Option<Notice> {
        self.link.observe(&kind);
        match kind {
            ChannelEventKind::Opened => Some(Notice::info(
                "Connected to logs stream",
                "You are now receiving live logs",
            )),
            ChannelEventKind::Message(text) => {
                match decode_log_line(&text) {
                    Some(line) => {
                        self.lines.push_back(line);
                        while self.lines.len() > self.max_lines {
                            self.lines.pop_front();
                        }
                    }
                    None => tracing::warn!("Invalid log frame: {}", text),
                }
                None
            }
            ChannelEventKind::Closed => None,
            ChannelEventKind::Error(_) => Some(Notice::error(
                "Connection Error",
                "Failed to connect to logs stream",
            )),
        }
    }
}
