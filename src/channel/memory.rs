//! 内存连接器（用于测试，无需网络）
//!
//! 记录每次 open 的地址，保留出站帧供断言；入站事件由测试直接构造 ChannelEvent 注入。

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{Address, Channel, ChannelId, Connector};

#[derive(Debug)]
struct OpenedChannel {
    id: ChannelId,
    address: Address,
    cancel: CancellationToken,
    outbound: mpsc::UnboundedReceiver<String>,
    sent: Vec<String>,
}

impl OpenedChannel {
    fn drain(&mut self) {
        while let Ok(frame) = self.outbound.try_recv() {
            self.sent.push(frame);
        }
    }
}

/// 内存连接器
#[derive(Debug, Default)]
pub struct MemoryConnector {
    next_id: u64,
    opened: Vec<OpenedChannel>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前仍未关闭的通道
    pub fn live_channels(&self) -> Vec<(ChannelId, Address)> {
        self.opened
            .iter()
            .filter(|c| !c.cancel.is_cancelled())
            .map(|c| (c.id, c.address.clone()))
            .collect()
    }

    pub fn is_live(&self, id: ChannelId) -> bool {
        self.opened
            .iter()
            .any(|c| c.id == id && !c.cancel.is_cancelled())
    }

    /// 某通道迄今发出的全部帧
    pub fn sent(&mut self, id: ChannelId) -> Vec<String> {
        match self.opened.iter_mut().find(|c| c.id == id) {
            Some(channel) => {
                channel.drain();
                channel.sent.clone()
            }
            None => Vec::new(),
        }
    }

    /// 某通道迄今发出的全部帧（解析为 JSON）
    pub fn sent_json(&mut self, id: ChannelId) -> Vec<serde_json::Value> {
        self.sent(id)
            .iter()
            .filter_map(|frame| serde_json::from_str(frame).ok())
            .collect()
    }
}

impl Connector for MemoryConnector {
    fn open(&mut self, address: &Address) -> Channel {
        self.next_id += 1;
        let id = ChannelId(self.next_id);
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        self.opened.push(OpenedChannel {
            id,
            address: address.clone(),
            cancel: cancel.clone(),
            outbound: rx,
            sent: Vec::new(),
        });
        Channel::new(id, address.clone(), tx, cancel)
    }
}
