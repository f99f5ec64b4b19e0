//! 事件处理
//!
//! 轮询 crossterm 键盘事件，按当前是否在编辑草稿把按键映射为 UiAction；
//! 编辑模式下可打印字符进入草稿，其余模式下单键即快捷操作。

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// 界面动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    /// 选择第 n 个文档槽位（0 起）
    SelectSlot(usize),
    FocusNext,
    Up,
    Down,
    /// 人物栏：切换人物；建议栏：切换编辑
    Activate,
    RequestNext,
    Accept,
    Reject,
    ToggleEdit,
    Dismiss,
    Reconnect,
    ToggleLogs,
    ClearLogs,
    ReconnectLogs,
    RefreshPersonas,
    ScrollUp,
    ScrollDown,
    Input(char),
    Backspace,
    /// 编辑模式下以草稿接受
    SaveEdit,
    /// 放弃草稿回到预览
    CancelEdit,
    Quit,
}

/// 按键 → 动作；无对应动作时返回 None
pub fn map_key(key: KeyEvent, editing: bool) -> Option<UiAction> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('c') if ctrl => return Some(UiAction::Quit),
        KeyCode::PageUp => return Some(UiAction::ScrollUp),
        KeyCode::PageDown => return Some(UiAction::ScrollDown),
        _ => {}
    }

    if editing {
        return match key.code {
            KeyCode::Esc => Some(UiAction::CancelEdit),
            KeyCode::Char('s') if ctrl => Some(UiAction::SaveEdit),
            KeyCode::Enter => Some(UiAction::Input('\n')),
            KeyCode::Backspace => Some(UiAction::Backspace),
            KeyCode::Char(c) if !ctrl => Some(UiAction::Input(c)),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Char('r') if ctrl => Some(UiAction::Reconnect),
        KeyCode::Char(c) if ctrl => {
            tracing::trace!("Unbound ctrl key: {}", c);
            None
        }
        KeyCode::Char(d @ '1'..='9') => {
            d.to_digit(10).map(|n| UiAction::SelectSlot(n as usize - 1))
        }
        KeyCode::Tab | KeyCode::BackTab => Some(UiAction::FocusNext),
        KeyCode::Up | KeyCode::Char('k') => Some(UiAction::Up),
        KeyCode::Down | KeyCode::Char('j') => Some(UiAction::Down),
        KeyCode::Enter => Some(UiAction::Activate),
        KeyCode::Char('n') => Some(UiAction::RequestNext),
        KeyCode::Char('a') => Some(UiAction::Accept),
        KeyCode::Char('r') => Some(UiAction::Reject),
        KeyCode::Char('e') => Some(UiAction::ToggleEdit),
        KeyCode::Char('d') => Some(UiAction::Dismiss),
        KeyCode::Char('l') => Some(UiAction::ToggleLogs),
        KeyCode::Char('L') => Some(UiAction::ReconnectLogs),
        KeyCode::Char('c') => Some(UiAction::ClearLogs),
        KeyCode::Char('p') => Some(UiAction::RefreshPersonas),
        KeyCode::Char('q') => Some(UiAction::Quit),
        _ => None,
    }
}

/// 事件处理器：poll 时读键盘，只返回按下事件
pub struct EventHandler {
    timeout: std::time::Duration,
}

impl EventHandler {
    pub fn new(timeout: std::time::Duration) -> Self {
        Self { timeout }
    }

    pub fn poll(&self) -> anyhow::Result<Option<KeyEvent>> {
        if event::poll(self.timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(Some(key));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn test_browse_mode_shortcuts() {
        assert_eq!(map_key(key(KeyCode::Char('2')), false), Some(UiAction::SelectSlot(1)));
        assert_eq!(map_key(key(KeyCode::Char('n')), false), Some(UiAction::RequestNext));
        assert_eq!(map_key(key(KeyCode::Char('r')), false), Some(UiAction::Reject));
        assert_eq!(map_key(ctrl('r'), false), Some(UiAction::Reconnect));
        assert_eq!(map_key(key(KeyCode::Char('0')), false), None);
        assert_eq!(map_key(key(KeyCode::Esc), false), None);
    }

    #[test]
    fn test_edit_mode_captures_text() {
        assert_eq!(map_key(key(KeyCode::Char('a')), true), Some(UiAction::Input('a')));
        assert_eq!(map_key(key(KeyCode::Char('q')), true), Some(UiAction::Input('q')));
        assert_eq!(map_key(key(KeyCode::Enter), true), Some(UiAction::Input('\n')));
        assert_eq!(map_key(ctrl('s'), true), Some(UiAction::SaveEdit));
        assert_eq!(map_key(key(KeyCode::Esc), true), Some(UiAction::CancelEdit));
    }

    #[test]
    fn test_quit_always_available() {
        assert_eq!(map_key(ctrl('q'), true), Some(UiAction::Quit));
        assert_eq!(map_key(ctrl('c'), false), Some(UiAction::Quit));
        assert_eq!(map_key(key(KeyCode::Char('q')), false), Some(UiAction::Quit));
    }
}
