//! 界面渲染
//!
//! 根据 DeskSnapshot 与 App 绘制：顶栏为文档槽位与连接状态；左侧人物列表；
//! 右侧上方为文档全文（或实时日志），下方为建议卡片（预览显示词级 diff，编辑显示草稿）；
//! 底部为最近的通知与快捷键提示。

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::channel::LinkState;
use crate::core::{DeskSnapshot, NoticeLevel, SessionPhase, SuggestionCard};
use crate::session::{DiffKind, DisplayMode};
use crate::ui::app::{App, Focus};

/// 底栏显示的通知条数
const VISIBLE_NOTIFICATIONS: usize = 3;

fn link_style(link: LinkState) -> Style {
    match link {
        LinkState::Open => Style::default().fg(Color::Green),
        LinkState::Connecting => Style::default().fg(Color::Yellow),
        LinkState::Disconnected => Style::default().fg(Color::Red),
    }
}

fn focus_border(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn phase_label(phase: &SessionPhase) -> String {
    match phase {
        SessionPhase::Idle => "空闲".to_string(),
        SessionPhase::Requesting => "请求中…".to_string(),
        SessionPhase::Exhausted => "已无更多建议".to_string(),
        SessionPhase::Failed(message) => format!("失败: {}", message),
    }
}

/// 绘制一帧
pub fn draw(f: &mut Frame, app: &App, snap: &DeskSnapshot) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(8),
            Constraint::Length(VISIBLE_NOTIFICATIONS as u16 + 2),
        ])
        .split(f.area());

    draw_header(f, rows[0], app, snap);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(24), Constraint::Min(30)])
        .split(rows[1]);
    draw_personas(f, columns[0], app, snap);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(columns[1]);
    if app.show_logs {
        draw_logs(f, right[0], app, snap);
    } else {
        draw_document(f, right[0], app, snap);
    }
    draw_suggestions(f, right[1], app, snap);

    draw_footer(f, rows[2], app, snap);
}

fn draw_header(f: &mut Frame, area: Rect, app: &App, snap: &DeskSnapshot) {
    let selected = snap.document.as_ref().map(|d| d.selector);
    let mut spans = vec![Span::styled(
        " Redline ",
        Style::default().fg(Color::Black).bg(Color::Yellow),
    )];
    for (i, slot) in app.slots.iter().enumerate() {
        let style = if Some(*slot) == selected {
            Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::raw(" "));
        spans.push(Span::styled(format!("[{}] 文档 {}", i + 1, slot), style));
    }
    if let Some(doc) = &snap.document {
        spans.push(Span::raw("  文档通道: "));
        spans.push(Span::styled(doc.link.to_string(), link_style(doc.link)));
    }
    if let Some(session) = &snap.session {
        spans.push(Span::raw("  建议通道: "));
        spans.push(Span::styled(session.link.to_string(), link_style(session.link)));
        spans.push(Span::raw(format!("  │ {}", phase_label(&session.phase))));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_personas(f: &mut Frame, area: Rect, app: &App, snap: &DeskSnapshot) {
    let items: Vec<ListItem> = app
        .personas
        .iter()
        .map(|persona| {
            let active = snap.persona.as_ref() == Some(persona);
            let marker = if active { "● " } else { "  " };
            let style = if active {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(Span::styled(format!("{}{}", marker, persona), style)))
        })
        .collect();

    let focused = app.focus == Focus::Personas;
    let list = List::new(items)
        .block(
            Block::default()
                .title(" 人物 ")
                .borders(Borders::ALL)
                .border_style(focus_border(focused)),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default();
    if !app.personas.is_empty() {
        state.select(Some(app.persona_cursor));
    }
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_document(f: &mut Frame, area: Rect, app: &App, snap: &DeskSnapshot) {
    let (title, body) = match &snap.document {
        None => (" 文档 ".to_string(), Text::raw("按数字键选择文档")),
        Some(doc) if doc.loading => (
            format!(" 文档 {} ", doc.selector),
            Text::styled("加载中…", Style::default().fg(Color::DarkGray)),
        ),
        Some(doc) => {
            let title = if doc.unconfirmed_edits > 0 {
                format!(" 文档 {} │ {} 处本地修改待确认 ", doc.selector, doc.unconfirmed_edits)
            } else {
                format!(" 文档 {} ", doc.selector)
            };
            (title, Text::raw(doc.content.clone()))
        }
    };
    let paragraph = Paragraph::new(body)
        .block(Block::default().title(title).borders(Borders::ALL))
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));
    f.render_widget(paragraph, area);
}

fn draw_logs(f: &mut Frame, area: Rect, app: &App, snap: &DeskSnapshot) {
    let (title, lines) = match &snap.logs {
        Some(logs) => (
            Line::from(vec![
                Span::raw(" 实时日志 "),
                Span::styled(format!("({}) ", logs.link), link_style(logs.link)),
            ]),
            logs.lines
                .iter()
                .map(|line| Line::from(line.as_str()))
                .collect::<Vec<_>>(),
        ),
        None => (Line::from(" 实时日志 "), vec![Line::from("连接中…")]),
    };
    let paragraph = Paragraph::new(lines)
        .block(Block::default().title(title).borders(Borders::ALL))
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));
    f.render_widget(paragraph, area);
}

fn diff_line(card: &SuggestionCard) -> Line<'_> {
    Line::from(
        card.diff
            .iter()
            .map(|span| match span.kind {
                DiffKind::Equal => Span::raw(span.text.as_str()),
                DiffKind::Removed => Span::styled(
                    span.text.as_str(),
                    Style::default()
                        .fg(Color::Red)
                        .add_modifier(Modifier::CROSSED_OUT),
                ),
                DiffKind::Inserted => {
                    Span::styled(span.text.as_str(), Style::default().fg(Color::Green))
                }
            })
            .collect::<Vec<_>>(),
    )
}

fn draw_suggestions(f: &mut Frame, area: Rect, app: &App, snap: &DeskSnapshot) {
    let focused = app.focus == Focus::Suggestions;
    let block = Block::default()
        .title(" 建议 ")
        .borders(Borders::ALL)
        .border_style(focus_border(focused));

    let Some(session) = &snap.session else {
        let hint = Paragraph::new("选择文档与人物后按 n 获取建议").block(block);
        f.render_widget(hint, area);
        return;
    };
    if session.suggestions.is_empty() {
        let hint = match session.phase {
            SessionPhase::Requesting => "等待建议…",
            SessionPhase::Exhausted => "没有更多建议",
            _ => "按 n 获取下一条建议",
        };
        f.render_widget(Paragraph::new(hint).block(block), area);
        return;
    }

    let mut lines: Vec<Line> = Vec::new();
    for (index, card) in session.suggestions.iter().enumerate() {
        if index > 0 {
            lines.push(Line::from(""));
        }
        let selected = index == app.suggestion_cursor;
        let marker = if selected { "▶ " } else { "  " };
        let mode = match card.mode {
            DisplayMode::Preview => "预览",
            DisplayMode::Edit => "编辑",
        };
        lines.push(Line::from(vec![
            Span::styled(marker, Style::default().fg(Color::Yellow)),
            Span::styled(
                format!("{} [{}] ", card.id, mode),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled(card.rationale.as_str(), Style::default().fg(Color::Gray)),
        ]));
        match card.mode {
            DisplayMode::Preview => lines.push(diff_line(card)),
            DisplayMode::Edit => {
                let draft = match &app.editing {
                    Some((id, buffer)) if *id == card.id => buffer.as_str(),
                    _ => card.draft.as_deref().unwrap_or(card.proposed.as_str()),
                };
                lines.push(Line::from(vec![
                    Span::styled("原文: ", Style::default().fg(Color::DarkGray)),
                    Span::raw(card.origin.as_str()),
                ]));
                lines.push(Line::from(vec![
                    Span::styled("替换: ", Style::default().fg(Color::DarkGray)),
                    Span::styled(draft, Style::default().fg(Color::Cyan)),
                    Span::styled("▏", Style::default().fg(Color::Cyan)),
                ]));
            }
        }
    }
    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

fn draw_footer(f: &mut Frame, area: Rect, app: &App, snap: &DeskSnapshot) {
    let mut lines: Vec<Line> = snap
        .notifications
        .iter()
        .rev()
        .take(VISIBLE_NOTIFICATIONS)
        .map(|n| {
            let color = match n.level {
                NoticeLevel::Info => Color::Blue,
                NoticeLevel::Warning => Color::Yellow,
                NoticeLevel::Error => Color::Red,
            };
            Line::from(vec![
                Span::styled(
                    format!("{} {} ", n.at.format("%H:%M:%S"), n.title),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
                Span::raw(n.body.as_str()),
            ])
        })
        .collect();
    if lines.is_empty() {
        if let Some(status) = &app.status {
            lines.push(Line::from(Span::styled(
                status.as_str(),
                Style::default().fg(Color::DarkGray),
            )));
        }
    }

    let help = if app.is_editing() {
        " 输入编辑 │ Ctrl+S 接受 │ Esc 放弃 "
    } else {
        " 1-9 文档 │ Tab 切换栏 │ Enter 选择 │ n 下一条 │ a 接受 │ r 拒绝 │ e 编辑 │ d 关闭通知 │ Ctrl+R 重连 │ l 日志 │ q 退出 "
    };
    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .title(help)
            .borders(Borders::TOP)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(paragraph, area);
}
