//! 建议会话：绑定一个 (persona, document) 的状态机
//!
//! 状态：Idle → Requesting →（建议 / 错误帧 → Idle，结束标记 → Exhausted）；
//! 请求超时进入 Failed(message)，可再次请求。Exhausted 为终态，只能通过重新选择重建会话。
//!
//! 同一时刻最多一个未完成请求：Requesting 状态下的再次请求直接拒绝，不发帧。

mod diff;
mod reconcile;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::channel::{
    frame::{decode_server_frame, ClientFrame, ServerFrame, SuggestionPayload},
    Address, Channel, ChannelEventKind, ChannelId, Connector, DocId, LinkState, Persona,
};
use crate::core::{Notice, ReviewError, SessionPhase};

pub use diff::{word_diff, DiffKind, DiffSpan};
pub use reconcile::Accepted;

/// 客户端分配的建议 ID（会话内单调递增）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SuggestionId(pub u64);

impl std::fmt::Display for SuggestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 一条待审阅的建议
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub id: SuggestionId,
    pub origin_text: String,
    pub proposed_text: String,
    pub rationale: String,
}

/// 建议的展示模式：预览（diff）或编辑（自由修改替换文本）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Preview,
    Edit,
}

/// 会话状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Requesting { since: Instant },
    Exhausted,
    Failed(String),
}

/// 建议会话
#[derive(Debug)]
pub struct SuggestionSession {
    /// 日志关联用的会话标签
    tag: String,
    persona: Persona,
    document: DocId,
    channel: Channel,
    link: LinkState,
    state: SessionState,
    suggestions: Vec<Suggestion>,
    /// 编辑草稿：存在即处于编辑模式
    drafts: HashMap<SuggestionId, String>,
    next_id: u64,
}

impl SuggestionSession {
    pub fn open(persona: Persona, document: DocId, connector: &mut dyn Connector) -> Self {
        let tag = format!("session_{}", uuid::Uuid::new_v4());
        let channel = connector.open(&Address::Suggestions {
            persona: persona.clone(),
            document,
        });
        tracing::info!(
            session = %tag,
            %persona,
            %document,
            channel = %channel.id(),
            "Session created"
        );
        Self {
            tag,
            persona,
            document,
            channel,
            link: LinkState::Connecting,
            state: SessionState::Idle,
            suggestions: Vec::new(),
            drafts: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn document(&self) -> DocId {
        self.document
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel.id()
    }

    pub fn link(&self) -> LinkState {
        self.link
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        match &self.state {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::Requesting { .. } => SessionPhase::Requesting,
            SessionState::Exhausted => SessionPhase::Exhausted,
            SessionState::Failed(message) => SessionPhase::Failed(message.clone()),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, SessionState::Requesting { .. })
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    pub fn suggestion(&self, id: SuggestionId) -> Option<&Suggestion> {
        self.suggestions.iter().find(|s| s.id == id)
    }

    /// 请求下一条建议
    pub fn request_next(&mut self, now: Instant) -> Result<(), ReviewError> {
        match self.state {
            SessionState::Requesting { .. } => return Err(ReviewError::RequestInFlight),
            SessionState::Exhausted => return Err(ReviewError::Exhausted),
            SessionState::Idle | SessionState::Failed(_) => {}
        }
        if !self.link.is_open() {
            return Err(ReviewError::ConnectionUnavailable);
        }
        if let Err(e) = self.channel.send_json(&ClientFrame::GetSuggestion) {
            tracing::warn!(session = %self.tag, "Request send failed: {}", e);
            self.link = LinkState::Disconnected;
            return Err(ReviewError::ConnectionUnavailable);
        }
        tracing::debug!(session = %self.tag, "Requested next suggestion");
        self.state = SessionState::Requesting { since: now };
        Ok(())
    }

    /// 处理本会话通道的入站事件
    pub fn on_event(&mut self, kind: ChannelEventKind) -> Option<Notice> {
        self.link.observe(&kind);
        match kind {
            ChannelEventKind::Opened => {
                tracing::info!(session = %self.tag, "Suggestion channel open");
                None
            }
            ChannelEventKind::Message(text) => self.on_frame(&text),
            ChannelEventKind::Closed => {
                self.abort_request();
                Some(Notice::error(
                    "Suggestion channel closed",
                    format!("{} on document {} disconnected", self.persona, self.document),
                ))
            }
            ChannelEventKind::Error(reason) => {
                self.abort_request();
                Some(Notice::error("Connection error", reason))
            }
        }
    }

    fn on_frame(&mut self, text: &str) -> Option<Notice> {
        let frame = match decode_server_frame(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(session = %self.tag, "Dropping malformed frame: {}", e);
                self.settle();
                return None;
            }
        };

        match frame {
            ServerFrame::Suggestion(payload) => {
                if self.state == SessionState::Exhausted {
                    tracing::debug!(session = %self.tag, "Dropping suggestion after end marker");
                    return None;
                }
                let id = self.push_suggestion(payload);
                tracing::debug!(session = %self.tag, suggestion = %id, "Suggestion received");
                self.settle();
                None
            }
            ServerFrame::End { message } => {
                if self.state == SessionState::Exhausted {
                    return None;
                }
                self.state = SessionState::Exhausted;
                tracing::info!(session = %self.tag, "Suggestions exhausted");
                let body = if message.is_empty() {
                    format!("{} has no further suggestions", self.persona)
                } else {
                    message
                };
                Some(Notice::info("No more suggestions", body))
            }
            ServerFrame::Error { message } => {
                self.settle();
                Some(Notice::error("Suggestion error", message))
            }
        }
    }

    fn push_suggestion(&mut self, payload: SuggestionPayload) -> SuggestionId {
        self.next_id += 1;
        let id = SuggestionId(self.next_id);
        self.suggestions.push(Suggestion {
            id,
            origin_text: payload.content,
            proposed_text: payload.replacement,
            rationale: payload.reason,
        });
        id
    }

    /// 收到一帧响应后回到 Idle（Failed 期间迟到的响应同样结束失败态）
    fn settle(&mut self) {
        if matches!(
            self.state,
            SessionState::Requesting { .. } | SessionState::Failed(_)
        ) {
            self.state = SessionState::Idle;
        }
    }

    fn abort_request(&mut self) {
        if self.is_pending() {
            self.state = SessionState::Idle;
        }
    }

    /// 超过等待上限的请求进入 Failed
    pub fn check_timeout(&mut self, now: Instant, timeout: Duration) -> Option<Notice> {
        let SessionState::Requesting { since } = self.state else {
            return None;
        };
        if now.saturating_duration_since(since) < timeout {
            return None;
        }
        let message = format!("No response within {}s", timeout.as_secs());
        tracing::warn!(session = %self.tag, "{}", message);
        self.state = SessionState::Failed(message.clone());
        Some(Notice::error("Suggestion request timed out", message))
    }

    /// 为同一 (persona, document) 重建通道；保留待审建议，未完成请求作废
    pub fn reconnect(&mut self, connector: &mut dyn Connector) {
        self.channel.close();
        self.channel = connector.open(&Address::Suggestions {
            persona: self.persona.clone(),
            document: self.document,
        });
        self.link = LinkState::Connecting;
        self.abort_request();
        tracing::info!(session = %self.tag, channel = %self.channel.id(), "Session reconnecting");
    }

    /// 销毁会话：关闭通道，丢弃待审列表与草稿
    pub fn close(self) {
        tracing::info!(
            session = %self.tag,
            discarded = self.suggestions.len(),
            "Session closed"
        );
        self.channel.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryConnector;
    use std::collections::HashSet;

    fn open_session() -> (SuggestionSession, MemoryConnector) {
        let mut connector = MemoryConnector::new();
        let mut session = SuggestionSession::open(Persona::new("editor"), DocId(1), &mut connector);
        session.on_event(ChannelEventKind::Opened);
        (session, connector)
    }

    fn suggestion_frame(content: &str, replacement: &str) -> ChannelEventKind {
        ChannelEventKind::Message(
            serde_json::json!({"content": content, "replacement": replacement, "reason": "r"})
                .to_string(),
        )
    }

    #[test]
    fn test_request_requires_open_channel() {
        let mut connector = MemoryConnector::new();
        let mut session = SuggestionSession::open(Persona::new("editor"), DocId(1), &mut connector);
        assert_eq!(
            session.request_next(Instant::now()),
            Err(ReviewError::ConnectionUnavailable)
        );
        assert_eq!(session.state(), &SessionState::Idle);
        assert!(connector.sent(session.channel_id()).is_empty());
    }

    #[test]
    fn test_at_most_one_request_in_flight() {
        let (mut session, mut connector) = open_session();
        let now = Instant::now();
        session.request_next(now).unwrap();
        assert_eq!(session.request_next(now), Err(ReviewError::RequestInFlight));
        assert_eq!(session.request_next(now), Err(ReviewError::RequestInFlight));
        assert_eq!(connector.sent(session.channel_id()).len(), 1);

        session.on_event(suggestion_frame("a", "b"));
        assert_eq!(session.state(), &SessionState::Idle);
        session.request_next(now).unwrap();
        assert_eq!(connector.sent(session.channel_id()).len(), 2);
    }

    #[test]
    fn test_ids_are_distinct() {
        let (mut session, _connector) = open_session();
        for i in 0..20 {
            session.request_next(Instant::now()).unwrap();
            session.on_event(suggestion_frame(&format!("o{i}"), "same"));
        }
        let ids: HashSet<_> = session.suggestions().iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), 20);
    }

    #[test]
    fn test_end_marker_exhausts() {
        let (mut session, mut connector) = open_session();
        session.request_next(Instant::now()).unwrap();
        let notice = session.on_event(ChannelEventKind::Message(
            r#"{"end":true,"message":"no more"}"#.into(),
        ));
        assert_eq!(session.state(), &SessionState::Exhausted);
        assert_eq!(notice.unwrap().body, "no more");

        assert_eq!(session.request_next(Instant::now()), Err(ReviewError::Exhausted));
        assert_eq!(connector.sent(session.channel_id()).len(), 1);

        session.on_event(suggestion_frame("late", "x"));
        assert!(session.suggestions().is_empty());
    }

    #[test]
    fn test_error_frame_returns_to_idle() {
        let (mut session, _connector) = open_session();
        session.request_next(Instant::now()).unwrap();
        let error_frame = r#"{"error":"rate limited"}"#;
        let notice = session.on_event(ChannelEventKind::Message(error_frame.into()));
        assert_eq!(session.state(), &SessionState::Idle);
        assert_eq!(notice.unwrap().body, "rate limited");
        assert!(session.request_next(Instant::now()).is_ok());
    }

    #[test]
    fn test_malformed_frame_clears_pending() {
        let (mut session, _connector) = open_session();
        session.request_next(Instant::now()).unwrap();
        let notice = session.on_event(ChannelEventKind::Message("{garbage".into()));
        assert!(notice.is_none());
        assert!(!session.is_pending());
        assert!(session.suggestions().is_empty());
    }

    #[test]
    fn test_channel_error_while_requesting() {
        let (mut session, _connector) = open_session();
        session.request_next(Instant::now()).unwrap();
        let notice = session.on_event(ChannelEventKind::Error("reset by peer".into()));
        assert_eq!(session.state(), &SessionState::Idle);
        assert_eq!(session.link(), LinkState::Disconnected);
        assert!(notice.is_some());
        assert_eq!(
            session.request_next(Instant::now()),
            Err(ReviewError::ConnectionUnavailable)
        );
    }

    #[test]
    fn test_timeout_moves_to_failed() {
        let (mut session, mut connector) = open_session();
        let start = Instant::now();
        session.request_next(start).unwrap();
        let timeout = Duration::from_secs(30);
        assert!(session.check_timeout(start + Duration::from_secs(5), timeout).is_none());
        let notice = session.check_timeout(start + Duration::from_secs(31), timeout);
        assert!(notice.is_some());
        assert!(matches!(session.state(), SessionState::Failed(_)));

        session.request_next(start + Duration::from_secs(32)).unwrap();
        assert_eq!(connector.sent(session.channel_id()).len(), 2);
    }

    #[test]
    fn test_unsolicited_suggestion_in_idle_is_kept() {
        let (mut session, _connector) = open_session();
        session.on_event(suggestion_frame("a", "b"));
        assert_eq!(session.suggestions().len(), 1);
        assert_eq!(session.state(), &SessionState::Idle);
    }

    #[test]
    fn test_reconnect_replaces_channel() {
        let (mut session, mut connector) = open_session();
        session.request_next(Instant::now()).unwrap();
        let old = session.channel_id();
        session.reconnect(&mut connector);
        assert!(!connector.is_live(old));
        assert!(connector.is_live(session.channel_id()));
        assert_eq!(session.link(), LinkState::Connecting);
        assert_eq!(session.state(), &SessionState::Idle);
    }
}
