//! 审阅台主控循环
//!
//! 三通道：UI -> Core 命令（mpsc）；通道事件 -> Core（mpsc，所有通道共用）；Core -> UI 快照（watch）。
//! 后台任务持有 ReviewDesk，按到达顺序处理命令与事件，并周期性检查请求超时。

use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::channel::{ChannelEvent, Connector, DocId, Endpoints, Persona, WsConnector};
use crate::config::AppConfig;
use crate::core::desk::{DeskOptions, ReviewDesk};
use crate::core::state::DeskSnapshot;
use crate::session::SuggestionId;

/// 从 UI 发往审阅台的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SelectDocument(DocId),
    /// 选择人物；再次选择当前人物即取消
    TogglePersona(Persona),
    RequestNext,
    Accept(SuggestionId),
    Reject(SuggestionId),
    ToggleEdit(SuggestionId),
    EditDraft(SuggestionId, String),
    Dismiss(u64),
    /// 重建已断开的文档 / 建议通道
    Reconnect,
    OpenLogs,
    ReconnectLogs,
    ClearLogs,
    Quit,
}

/// 执行一条命令；返回 false 表示退出
fn apply<C: Connector>(desk: &mut ReviewDesk<C>, cmd: Command) -> bool {
    tracing::debug!(?cmd, "Command received");
    let result = match cmd {
        Command::SelectDocument(selector) => {
            desk.select_document(selector);
            Ok(())
        }
        Command::TogglePersona(persona) => {
            desk.toggle_persona(persona);
            Ok(())
        }
        Command::RequestNext => desk.request_next(Instant::now()),
        Command::Accept(id) => desk.accept(id).map(|_| ()),
        Command::Reject(id) => desk.reject(id),
        Command::ToggleEdit(id) => desk.toggle_edit(id).map(|_| ()),
        Command::EditDraft(id, text) => desk.edit_draft(id, text),
        Command::Dismiss(id) => {
            desk.dismiss(id);
            Ok(())
        }
        Command::Reconnect => {
            desk.reconnect();
            Ok(())
        }
        Command::OpenLogs => {
            desk.open_logs();
            Ok(())
        }
        Command::ReconnectLogs => {
            desk.reconnect_logs();
            Ok(())
        }
        Command::ClearLogs => {
            desk.clear_logs();
            Ok(())
        }
        Command::Quit => return false,
    };
    if let Err(e) = result {
        tracing::debug!("Command not applied: {}", e);
    }
    true
}

/// 主控循环：直到收到 Quit 或命令发送端全部关闭
pub async fn run_desk<C: Connector>(
    mut desk: ReviewDesk<C>,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    mut event_rx: mpsc::UnboundedReceiver<ChannelEvent>,
    state_tx: watch::Sender<DeskSnapshot>,
    tick: Duration,
) {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(cmd) => {
                    if !apply(&mut desk, cmd) {
                        break;
                    }
                }
                None => break,
            },
            Some(event) = event_rx.recv() => desk.handle_event(event),
            _ = ticker.tick() => {
                if !desk.tick(Instant::now()) {
                    continue;
                }
            }
        }
        let _ = state_tx.send(desk.snapshot());
    }

    desk.shutdown();
    let _ = state_tx.send(desk.snapshot());
}

/// 创建审阅台运行时：返回命令发送端与快照接收端；必须在 tokio 运行时内调用
pub fn spawn_desk(
    cfg: &AppConfig,
) -> (mpsc::UnboundedSender<Command>, watch::Receiver<DeskSnapshot>) {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<ChannelEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
    let (state_tx, state_rx) = watch::channel(DeskSnapshot::default());

    let connector = WsConnector::new(Endpoints::from_config(&cfg.server), event_tx);
    let desk = ReviewDesk::new(connector, DeskOptions::from_config(cfg));
    let tick = Duration::from_millis(cfg.session.tick_millis.max(10));

    tracing::info!(server = %cfg.server.ws_base(), "Review desk started");
    tokio::spawn(run_desk(desk, cmd_rx, event_rx, state_tx, tick));

    (cmd_tx, state_rx)
}
