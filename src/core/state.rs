//! 状态定义：通知中心与 DeskSnapshot 投影
//!
//! UI 只持有轻量的 DeskSnapshot（文档、人物、会话、日志、通知）；
//! 完整状态由 ReviewDesk 维护，每处理一个事件后投影一次。

use std::collections::VecDeque;

use chrono::{DateTime, Local};

use crate::channel::{DocId, LinkState, Persona};
use crate::session::{DiffSpan, DisplayMode, SuggestionId};

/// 通知级别
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// 组件产生的待展示消息（尚未编号）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub body: String,
}

impl Notice {
    pub fn info(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, title, body)
    }

    pub fn warning(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, title, body)
    }

    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, title, body)
    }

    fn new(level: NoticeLevel, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            body: body.into(),
        }
    }
}

/// 可关闭的通知
#[derive(Clone, Debug)]
pub struct Notification {
    pub id: u64,
    pub level: NoticeLevel,
    pub title: String,
    pub body: String,
    pub at: DateTime<Local>,
}

/// 通知中心：有界队列，超出容量时丢弃最旧的
#[derive(Debug)]
pub struct NotificationCenter {
    next_id: u64,
    capacity: usize,
    items: VecDeque<Notification>,
}

impl NotificationCenter {
    pub fn new(capacity: usize) -> Self {
        Self {
            next_id: 0,
            capacity: capacity.max(1),
            items: VecDeque::new(),
        }
    }

    pub fn push(&mut self, notice: Notice) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        match notice.level {
            NoticeLevel::Error => tracing::warn!(title = %notice.title, "{}", notice.body),
            _ => tracing::info!(title = %notice.title, "{}", notice.body),
        }
        self.items.push_back(Notification {
            id,
            level: notice.level,
            title: notice.title,
            body: notice.body,
            at: Local::now(),
        });
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
        id
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.id != id);
        self.items.len() != before
    }

    pub fn items(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// 会话阶段（UI 投影用，不含计时信息）
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Requesting,
    Exhausted,
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct DocumentSnapshot {
    pub selector: DocId,
    pub content: String,
    pub loading: bool,
    pub link: LinkState,
    pub unconfirmed_edits: usize,
}

/// 单条建议卡片
#[derive(Clone, Debug)]
pub struct SuggestionCard {
    pub id: SuggestionId,
    pub origin: String,
    pub proposed: String,
    pub rationale: String,
    pub mode: DisplayMode,
    pub draft: Option<String>,
    pub diff: Vec<DiffSpan>,
}

#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub persona: Persona,
    pub document: DocId,
    pub phase: SessionPhase,
    pub link: LinkState,
    pub suggestions: Vec<SuggestionCard>,
}

#[derive(Clone, Debug)]
pub struct LogSnapshot {
    pub link: LinkState,
    pub lines: Vec<String>,
}

/// UI 看到的「投影」状态
#[derive(Clone, Debug, Default)]
pub struct DeskSnapshot {
    pub document: Option<DocumentSnapshot>,
    pub persona: Option<Persona>,
    pub session: Option<SessionSnapshot>,
    pub logs: Option<LogSnapshot>,
    pub notifications: Vec<Notification>,
}
