//! WebSocket 连接器：每个通道一个后台任务
//!
//! 任务负责连接、转发入站文本帧、写出站帧；取消后不再产生任何事件。

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use super::{
    Address, Channel, ChannelError, ChannelEvent, ChannelEventKind, ChannelId, Connector,
    Endpoints,
};

/// 基于 tokio-tungstenite 的连接器；必须在 tokio 运行时内调用 open
pub struct WsConnector {
    endpoints: Endpoints,
    events: mpsc::UnboundedSender<ChannelEvent>,
    next_id: u64,
}

impl WsConnector {
    pub fn new(endpoints: Endpoints, events: mpsc::UnboundedSender<ChannelEvent>) -> Self {
        Self {
            endpoints,
            events,
            next_id: 0,
        }
    }
}

impl Connector for WsConnector {
    fn open(&mut self, address: &Address) -> Channel {
        self.next_id += 1;
        let id = ChannelId(self.next_id);
        let url = self.endpoints.url(address);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
        let cancel = CancellationToken::new();

        tracing::info!(channel = %id, %address, %url, "Opening channel");
        tokio::spawn(run_channel(
            id,
            url,
            outbound_rx,
            cancel.clone(),
            self.events.clone(),
        ));

        Channel::new(id, address.clone(), outbound_tx, cancel)
    }
}

async fn run_channel(
    id: ChannelId,
    url: String,
    mut outbound: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<ChannelEvent>,
) {
    let connect = tokio::select! {
        _ = cancel.cancelled() => return,
        result = connect_async(url.as_str()) => result,
    };

    let (ws_stream, _) = match connect {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(channel = %id, %url, "Connect failed: {}", e);
            if !cancel.is_cancelled() {
                let _ = events.send(ChannelEvent::error(id, &ChannelError::Connect(e.to_string())));
            }
            return;
        }
    };

    if cancel.is_cancelled() {
        return;
    }
    let _ = events.send(ChannelEvent::opened(id));
    tracing::info!(channel = %id, "Channel connected");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let ending = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break None,
            frame = outbound.recv() => match frame {
                Some(text) => {
                    if let Err(e) = ws_tx.send(WsMessage::Text(text)).await {
                        break Some(ChannelEventKind::Error(
                            ChannelError::Transport(e.to_string()).to_string(),
                        ));
                    }
                }
                None => break None,
            },
            inbound = ws_rx.next() => match inbound {
                Some(Ok(WsMessage::Text(text))) => {
                    let _ = events.send(ChannelEvent::message(id, text));
                }
                Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => {
                        let _ = events.send(ChannelEvent::message(id, text));
                    }
                    Err(_) => tracing::warn!(channel = %id, "Dropping non-UTF-8 binary frame"),
                },
                Some(Ok(WsMessage::Close(_))) | None => break Some(ChannelEventKind::Closed),
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    break Some(ChannelEventKind::Error(
                        ChannelError::Transport(e.to_string()).to_string(),
                    ));
                }
            },
        }
    };

    let _ = ws_tx.close().await;

    match ending {
        Some(kind) if !cancel.is_cancelled() => {
            tracing::info!(channel = %id, ?kind, "Channel ended");
            let _ = events.send(ChannelEvent::new(id, kind));
        }
        _ => tracing::debug!(channel = %id, "Channel task cancelled"),
    }
}
