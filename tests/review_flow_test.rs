//! 审阅流程集成测试：本地 WebSocket 服务端 + WsConnector + 主控循环

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use redline::channel::{DocId, LinkState, Persona};
    use redline::config::AppConfig;
    use redline::core::{spawn_desk, Command, DeskSnapshot, SessionPhase};
    use serde_json::{json, Value};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::{mpsc, watch};
    use tokio_tungstenite::accept_hdr_async;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
    use tokio_tungstenite::tungstenite::Message;

    /// 模拟后端：文档通道连上即推送全文；"quiet" 人物直接回结束标记；accept 帧转发给测试
    async fn serve(listener: TcpListener, accepted: mpsc::UnboundedSender<Value>) {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(handle(stream, accepted.clone()));
        }
    }

    async fn handle(stream: TcpStream, accepted: mpsc::UnboundedSender<Value>) {
        let mut path = String::new();
        let record_path = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            path = req.uri().path().to_string();
            Ok(resp)
        };
        let ws = accept_hdr_async(stream, record_path).await;
        let Ok(mut ws) = ws else {
            return;
        };

        if path.starts_with("/api/document/") {
            let _ = ws
                .send(Message::Text(json!({"content": "foo baz"}).to_string()))
                .await;
        }

        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(text) = msg else {
                continue;
            };
            let frame: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
            match frame["action"].as_str() {
                Some("get_suggestion") if path.contains("/quiet/") => {
                    let end = json!({"end": true, "message": "no more"});
                    let _ = ws.send(Message::Text(end.to_string())).await;
                }
                Some("get_suggestion") => {
                    let suggestion =
                        json!({"content": "foo", "replacement": "bar", "reason": "clarity"});
                    let _ = ws.send(Message::Text(suggestion.to_string())).await;
                }
                Some("accept_suggestion") => {
                    let _ = accepted.send(frame);
                }
                _ => {}
            }
        }
    }

    async fn start_server() -> (SocketAddr, mpsc::UnboundedReceiver<Value>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(serve(listener, tx));
        (addr, rx)
    }

    fn config_for(addr: SocketAddr) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.server.base_url = format!("http://{}", addr);
        cfg.session.tick_millis = 20;
        cfg
    }

    async fn wait_for(
        rx: &mut watch::Receiver<DeskSnapshot>,
        predicate: impl FnMut(&DeskSnapshot) -> bool,
    ) -> DeskSnapshot {
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(predicate))
            .await
            .expect("timed out waiting for snapshot")
            .expect("desk stopped")
            .clone()
    }

    fn ready(s: &DeskSnapshot) -> bool {
        let doc_loaded = s
            .document
            .as_ref()
            .map_or(false, |d| !d.loading && d.content == "foo baz");
        let session_open = s
            .session
            .as_ref()
            .map_or(false, |session| session.link == LinkState::Open);
        doc_loaded && session_open
    }

    #[tokio::test]
    async fn test_request_and_accept_over_websocket() {
        let (addr, mut accepted) = start_server().await;
        let (cmd_tx, mut state_rx) = spawn_desk(&config_for(addr));

        cmd_tx.send(Command::SelectDocument(DocId(1))).unwrap();
        cmd_tx.send(Command::TogglePersona(Persona::new("editor"))).unwrap();
        wait_for(&mut state_rx, ready).await;

        cmd_tx.send(Command::RequestNext).unwrap();
        let snap = wait_for(&mut state_rx, |s| {
            s.session.as_ref().map_or(false, |session| session.suggestions.len() == 1)
        })
        .await;
        let session = snap.session.unwrap();
        let card = &session.suggestions[0];
        assert_eq!(card.origin, "foo");
        assert_eq!(card.proposed, "bar");

        cmd_tx.send(Command::Accept(card.id)).unwrap();
        wait_for(&mut state_rx, |s| {
            s.document.as_ref().map_or(false, |d| d.content == "bar baz")
        })
        .await;

        let frame = tokio::time::timeout(Duration::from_secs(5), accepted.recv())
            .await
            .expect("accept frame not received")
            .unwrap();
        assert_eq!(
            frame,
            json!({
                "action": "accept_suggestion",
                "suggestion": {"content": "foo", "replacement": "bar", "reason": "clarity"}
            })
        );

        cmd_tx.send(Command::Quit).unwrap();
    }

    #[tokio::test]
    async fn test_end_marker_exhausts_session() {
        let (addr, _accepted) = start_server().await;
        let (cmd_tx, mut state_rx) = spawn_desk(&config_for(addr));

        cmd_tx.send(Command::SelectDocument(DocId(1))).unwrap();
        cmd_tx.send(Command::TogglePersona(Persona::new("quiet"))).unwrap();
        wait_for(&mut state_rx, ready).await;

        cmd_tx.send(Command::RequestNext).unwrap();
        let snap = wait_for(&mut state_rx, |s| {
            s.session
                .as_ref()
                .map_or(false, |session| session.phase == SessionPhase::Exhausted)
        })
        .await;
        assert!(snap.notifications.iter().any(|n| n.body == "no more"));

        cmd_tx.send(Command::Quit).unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (cmd_tx, mut state_rx) = spawn_desk(&config_for(addr));
        cmd_tx.send(Command::SelectDocument(DocId(1))).unwrap();

        let snap = wait_for(&mut state_rx, |s| {
            s.document
                .as_ref()
                .map_or(false, |d| d.link == LinkState::Disconnected)
        })
        .await;
        assert!(!snap.notifications.is_empty());
        assert!(!snap.document.unwrap().loading);

        cmd_tx.send(Command::Quit).unwrap();
    }
}
