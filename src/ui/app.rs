//! TUI 应用主循环
//!
//! 进入全屏/原始模式，轮询 state_rx 与键盘事件，把 UiAction 交给 App 转为 Command 发送给审阅台，
//! 每帧用 draw 渲染 DeskSnapshot 与本地界面状态。

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::{mpsc, watch};

use crate::api::Backend;
use crate::channel::{DocId, Persona};
use crate::core::{Command, DeskSnapshot};
use crate::session::{DisplayMode, SuggestionId};
use crate::ui::event::{map_key, EventHandler, UiAction};
use crate::ui::render::draw;

/// 焦点所在栏
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Personas,
    Suggestions,
}

/// 本地界面状态（光标、焦点、编辑缓冲）；审阅状态本身只在快照里
#[derive(Debug, Default)]
pub struct App {
    pub slots: Vec<DocId>,
    pub personas: Vec<Persona>,
    pub focus: Focus,
    pub persona_cursor: usize,
    pub suggestion_cursor: usize,
    pub show_logs: bool,
    /// 正在编辑的建议及其草稿缓冲
    pub editing: Option<(SuggestionId, String)>,
    /// 快照是否已显示该建议进入编辑模式（ToggleEdit 尚未被处理时为 false）
    edit_confirmed: bool,
    pub status: Option<String>,
    pub scroll: u16,
}

impl App {
    pub fn new(slots: Vec<DocId>) -> Self {
        Self {
            slots,
            ..Self::default()
        }
    }

    pub fn set_personas(&mut self, personas: Vec<Persona>) {
        self.personas = personas;
        self.persona_cursor = self
            .persona_cursor
            .min(self.personas.len().saturating_sub(1));
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    /// 光标处的建议
    pub fn selected_suggestion(&self, snap: &DeskSnapshot) -> Option<SuggestionId> {
        snap.session
            .as_ref()
            .and_then(|s| s.suggestions.get(self.suggestion_cursor))
            .map(|card| card.id)
    }

    /// 快照变化后修正光标
    ///
    /// 编辑中的建议消失时退出编辑；快照确认过编辑模式后又回到预览时也退出。
    /// 快照落后于刚发出的 ToggleEdit 时（仍显示预览）保持编辑。
    pub fn sync(&mut self, snap: &DeskSnapshot) {
        let cards = snap.session.as_ref().map(|s| s.suggestions.as_slice()).unwrap_or(&[]);
        self.suggestion_cursor = self.suggestion_cursor.min(cards.len().saturating_sub(1));
        let Some(id) = self.editing.as_ref().map(|(id, _)| *id) else {
            return;
        };
        match cards.iter().find(|card| card.id == id).map(|card| card.mode) {
            None => {
                self.stop_editing();
            }
            Some(DisplayMode::Edit) => self.edit_confirmed = true,
            Some(DisplayMode::Preview) if self.edit_confirmed => {
                self.stop_editing();
            }
            Some(DisplayMode::Preview) => {}
        }
    }

    fn start_editing(&mut self, id: SuggestionId, text: String) {
        self.editing = Some((id, text));
        self.edit_confirmed = false;
    }

    fn stop_editing(&mut self) -> Option<(SuggestionId, String)> {
        self.edit_confirmed = false;
        self.editing.take()
    }

    /// 动作 → 命令
    pub fn handle(&mut self, action: UiAction, snap: &DeskSnapshot) -> Vec<Command> {
        let selected = self.selected_suggestion(snap);
        match action {
            UiAction::SelectSlot(index) => match self.slots.get(index).copied() {
                Some(slot) => {
                    self.stop_editing();
                    self.suggestion_cursor = 0;
                    vec![Command::SelectDocument(slot)]
                }
                None => Vec::new(),
            },
            UiAction::FocusNext => {
                self.focus = match self.focus {
                    Focus::Personas => Focus::Suggestions,
                    Focus::Suggestions => Focus::Personas,
                };
                Vec::new()
            }
            UiAction::Up => {
                match self.focus {
                    Focus::Personas => self.persona_cursor = self.persona_cursor.saturating_sub(1),
                    Focus::Suggestions => {
                        self.suggestion_cursor = self.suggestion_cursor.saturating_sub(1)
                    }
                }
                Vec::new()
            }
            UiAction::Down => {
                let len = match self.focus {
                    Focus::Personas => self.personas.len(),
                    Focus::Suggestions => snap.session.as_ref().map_or(0, |s| s.suggestions.len()),
                };
                let cursor = match self.focus {
                    Focus::Personas => &mut self.persona_cursor,
                    Focus::Suggestions => &mut self.suggestion_cursor,
                };
                *cursor = (*cursor + 1).min(len.saturating_sub(1));
                Vec::new()
            }
            UiAction::Activate => match self.focus {
                Focus::Personas => match self.personas.get(self.persona_cursor).cloned() {
                    Some(persona) => {
                        self.stop_editing();
                        self.suggestion_cursor = 0;
                        vec![Command::TogglePersona(persona)]
                    }
                    None => Vec::new(),
                },
                Focus::Suggestions => self.handle(UiAction::ToggleEdit, snap),
            },
            UiAction::RequestNext => vec![Command::RequestNext],
            UiAction::Accept => selected.map(Command::Accept).into_iter().collect(),
            UiAction::Reject => selected.map(Command::Reject).into_iter().collect(),
            UiAction::ToggleEdit => {
                let Some(card) = snap
                    .session
                    .as_ref()
                    .and_then(|s| s.suggestions.get(self.suggestion_cursor))
                else {
                    return Vec::new();
                };
                let id = card.id;
                if self.editing.as_ref().map(|(editing, _)| *editing) == Some(id)
                    || card.mode == DisplayMode::Edit
                {
                    self.stop_editing();
                } else {
                    self.start_editing(id, card.proposed.clone());
                }
                vec![Command::ToggleEdit(id)]
            }
            UiAction::Input(c) => match &mut self.editing {
                Some((id, buffer)) => {
                    buffer.push(c);
                    vec![Command::EditDraft(*id, buffer.clone())]
                }
                None => Vec::new(),
            },
            UiAction::Backspace => match &mut self.editing {
                Some((id, buffer)) => {
                    buffer.pop();
                    vec![Command::EditDraft(*id, buffer.clone())]
                }
                None => Vec::new(),
            },
            UiAction::SaveEdit => match self.stop_editing() {
                Some((id, _)) => vec![Command::Accept(id)],
                None => Vec::new(),
            },
            UiAction::CancelEdit => match self.stop_editing() {
                Some((id, _)) => vec![Command::ToggleEdit(id)],
                None => Vec::new(),
            },
            UiAction::Dismiss => snap
                .notifications
                .last()
                .map(|n| Command::Dismiss(n.id))
                .into_iter()
                .collect(),
            UiAction::Reconnect => vec![Command::Reconnect],
            UiAction::ToggleLogs => {
                self.show_logs = !self.show_logs;
                self.scroll = 0;
                if self.show_logs && snap.logs.is_none() {
                    vec![Command::OpenLogs]
                } else {
                    Vec::new()
                }
            }
            UiAction::ClearLogs if self.show_logs => vec![Command::ClearLogs],
            UiAction::ClearLogs => Vec::new(),
            UiAction::ReconnectLogs => vec![Command::ReconnectLogs],
            UiAction::ScrollUp => {
                self.scroll = self.scroll.saturating_sub(10);
                Vec::new()
            }
            UiAction::ScrollDown => {
                self.scroll = self.scroll.saturating_add(10);
                Vec::new()
            }
            // 由 run_app 处理（需要访问后端）
            UiAction::RefreshPersonas => Vec::new(),
            UiAction::Quit => vec![Command::Quit],
        }
    }
}

async fn load_personas(app: &mut App, backend: &dyn Backend) {
    match backend.personas().await {
        Ok(personas) => {
            app.status = Some(format!("{} personas loaded", personas.len()));
            app.set_personas(personas);
        }
        Err(e) => {
            tracing::warn!("Failed to load personas: {}", e);
            app.status = Some(format!("Failed to load personas: {}", e));
        }
    }
}

/// 运行 TUI：启用原始模式与全屏，循环 poll 事件 + 渲染，退出时恢复终端
pub async fn run_app(
    mut app: App,
    backend: Arc<dyn Backend>,
    state_rx: watch::Receiver<DeskSnapshot>,
    cmd_tx: mpsc::UnboundedSender<Command>,
) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let terminal_backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(terminal_backend)?;

    let result = event_loop(&mut terminal, &mut app, backend.as_ref(), state_rx, &cmd_tx).await;

    restore_terminal(&mut terminal)?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    backend: &dyn Backend,
    state_rx: watch::Receiver<DeskSnapshot>,
    cmd_tx: &mpsc::UnboundedSender<Command>,
) -> anyhow::Result<()> {
    let events = EventHandler::new(Duration::from_millis(100));
    load_personas(app, backend).await;

    loop {
        let snap = state_rx.borrow().clone();
        app.sync(&snap);

        terminal.draw(|f| draw(f, app, &snap))?;

        let Some(key) = events.poll()? else {
            tokio::task::yield_now().await;
            continue;
        };
        let Some(action) = map_key(key, app.is_editing()) else {
            continue;
        };
        if action == UiAction::RefreshPersonas {
            load_personas(app, backend).await;
            continue;
        }
        for cmd in app.handle(action, &snap) {
            let quit = cmd == Command::Quit;
            if cmd_tx.send(cmd).is_err() || quit {
                return Ok(());
            }
        }
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}
