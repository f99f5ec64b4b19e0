//! 审阅台：选择驱动的核心状态
//!
//! 持有连接器、文档视图、当前人物、建议会话、日志视图与通知中心。
//! 人物 / 文档切换是硬取消：旧会话连同通道先关闭，再按新选择重建；
//! 入站事件按通道 ID 路由，不属于任何当前通道的事件视为过期直接丢弃。

use std::time::{Duration, Instant};

use crate::channel::{ChannelEvent, Connector, DocId, LinkState, Persona};
use crate::config::AppConfig;
use crate::core::state::{
    DeskSnapshot, DocumentSnapshot, LogSnapshot, Notice, NotificationCenter, SessionSnapshot,
    SuggestionCard,
};
use crate::core::ReviewError;
use crate::document::DocumentView;
use crate::logs::LogView;
use crate::session::{Accepted, DisplayMode, SuggestionId, SuggestionSession};

/// 审阅台参数
#[derive(Debug, Clone)]
pub struct DeskOptions {
    pub request_timeout: Duration,
    pub max_notifications: usize,
    pub max_log_lines: usize,
}

impl Default for DeskOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_notifications: 20,
            max_log_lines: 2000,
        }
    }
}

impl DeskOptions {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            request_timeout: Duration::from_secs(cfg.session.request_timeout_secs),
            max_notifications: cfg.session.max_notifications,
            max_log_lines: cfg.logs.max_lines,
        }
    }
}

pub struct ReviewDesk<C: Connector> {
    connector: C,
    options: DeskOptions,
    document: Option<DocumentView>,
    persona: Option<Persona>,
    session: Option<SuggestionSession>,
    logs: Option<LogView>,
    notifications: NotificationCenter,
}

impl<C: Connector> ReviewDesk<C> {
    pub fn new(connector: C, options: DeskOptions) -> Self {
        let notifications = NotificationCenter::new(options.max_notifications);
        Self {
            connector,
            options,
            document: None,
            persona: None,
            session: None,
            logs: None,
            notifications,
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn connector_mut(&mut self) -> &mut C {
        &mut self.connector
    }

    pub fn document(&self) -> Option<&DocumentView> {
        self.document.as_ref()
    }

    pub fn persona(&self) -> Option<&Persona> {
        self.persona.as_ref()
    }

    pub fn session(&self) -> Option<&SuggestionSession> {
        self.session.as_ref()
    }

    pub fn logs(&self) -> Option<&LogView> {
        self.logs.as_ref()
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    fn notify(&mut self, notice: Option<Notice>) {
        if let Some(notice) = notice {
            self.notifications.push(notice);
        }
    }

    fn teardown_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.close();
        }
    }

    fn rebuild_session(&mut self) {
        if let (Some(persona), Some(document)) = (&self.persona, &self.document) {
            self.session = Some(SuggestionSession::open(
                persona.clone(),
                document.selector(),
                &mut self.connector,
            ));
        }
    }

    /// 选择文档；与当前文档相同时不做任何事
    pub fn select_document(&mut self, selector: DocId) {
        if self.document.as_ref().map(DocumentView::selector) == Some(selector) {
            return;
        }
        self.teardown_session();
        if let Some(view) = self.document.as_mut() {
            view.select(selector, &mut self.connector);
        } else {
            self.document = Some(DocumentView::open(selector, &mut self.connector));
        }
        self.rebuild_session();
    }

    /// 切换人物：再次选择当前人物即取消选择
    pub fn toggle_persona(&mut self, persona: Persona) {
        self.teardown_session();
        if self.persona.as_ref() == Some(&persona) {
            tracing::info!(%persona, "Persona deselected");
            self.persona = None;
            return;
        }
        tracing::info!(%persona, "Persona selected");
        self.persona = Some(persona);
        self.rebuild_session();
    }

    pub fn request_next(&mut self, now: Instant) -> Result<(), ReviewError> {
        let session = self.session.as_mut().ok_or(ReviewError::NoSession)?;
        let result = session.request_next(now);
        match &result {
            Err(ReviewError::ConnectionUnavailable) => {
                self.notifications.push(Notice::error(
                    "Connection unavailable",
                    "The suggestion channel is not connected",
                ));
            }
            Err(e) => tracing::debug!("Request ignored: {}", e),
            Ok(()) => {}
        }
        result
    }

    pub fn accept(&mut self, id: SuggestionId) -> Result<Accepted, ReviewError> {
        let (Some(session), Some(document)) = (self.session.as_mut(), self.document.as_mut())
        else {
            return Err(ReviewError::NoSession);
        };
        let accepted = session.accept(id, document)?;
        if accepted.delivery.is_err() {
            self.notifications.push(Notice::error(
                "Connection error",
                "The accepted edit was applied locally but could not be sent",
            ));
        }
        Ok(accepted)
    }

    pub fn reject(&mut self, id: SuggestionId) -> Result<(), ReviewError> {
        let session = self.session.as_mut().ok_or(ReviewError::NoSession)?;
        session.reject(id).map(|_| ())
    }

    pub fn toggle_edit(&mut self, id: SuggestionId) -> Result<DisplayMode, ReviewError> {
        let session = self.session.as_mut().ok_or(ReviewError::NoSession)?;
        session.toggle_edit(id)
    }

    pub fn edit_draft(&mut self, id: SuggestionId, text: String) -> Result<(), ReviewError> {
        let session = self.session.as_mut().ok_or(ReviewError::NoSession)?;
        session.edit_draft(id, text)
    }

    /// 按通道 ID 路由入站事件
    pub fn handle_event(&mut self, event: ChannelEvent) {
        let ChannelEvent { channel, kind } = event;

        if let Some(document) = self.document.as_mut() {
            if document.channel_id() == Some(channel) {
                let notice = document.on_event(kind);
                self.notify(notice);
                return;
            }
        }
        if let Some(session) = self.session.as_mut() {
            if session.channel_id() == channel {
                let notice = session.on_event(kind);
                self.notify(notice);
                return;
            }
        }
        if let Some(logs) = self.logs.as_mut() {
            if logs.channel_id() == Some(channel) {
                let notice = logs.on_event(kind);
                self.notify(notice);
                return;
            }
        }
        tracing::debug!(%channel, ?kind, "Dropping event for stale channel");
    }

    /// 定时检查请求超时；状态有变化时返回 true
    pub fn tick(&mut self, now: Instant) -> bool {
        let timeout = self.options.request_timeout;
        let notice = self
            .session
            .as_mut()
            .and_then(|session| session.check_timeout(now, timeout));
        let changed = notice.is_some();
        self.notify(notice);
        changed
    }

    /// 显式重连：仅重建已断开的文档 / 会话通道
    pub fn reconnect(&mut self) {
        if let Some(document) = self.document.as_mut() {
            if document.link() == LinkState::Disconnected {
                document.reconnect(&mut self.connector);
            }
        }
        if let Some(session) = self.session.as_mut() {
            if session.link() == LinkState::Disconnected {
                session.reconnect(&mut self.connector);
            }
        }
    }

    pub fn open_logs(&mut self) {
        if self.logs.is_none() {
            self.logs = Some(LogView::open(&mut self.connector, self.options.max_log_lines));
        }
    }

    pub fn reconnect_logs(&mut self) {
        match self.logs.as_mut() {
            Some(logs) => logs.reconnect(&mut self.connector),
            None => self.open_logs(),
        }
    }

    pub fn clear_logs(&mut self) {
        if let Some(logs) = self.logs.as_mut() {
            logs.clear();
        }
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        self.notifications.dismiss(id)
    }

    /// 关闭全部通道
    pub fn shutdown(&mut self) {
        self.teardown_session();
        if let Some(mut document) = self.document.take() {
            document.close();
        }
        self.logs = None;
        tracing::info!("Review desk shut down");
    }

    pub fn snapshot(&self) -> DeskSnapshot {
        DeskSnapshot {
            document: self.document.as_ref().map(|d| DocumentSnapshot {
                selector: d.selector(),
                content: d.content().to_string(),
                loading: d.is_loading(),
                link: d.link(),
                unconfirmed_edits: d.unconfirmed_edits().len(),
            }),
            persona: self.persona.clone(),
            session: self.session.as_ref().map(|s| SessionSnapshot {
                persona: s.persona().clone(),
                document: s.document(),
                phase: s.phase(),
                link: s.link(),
                suggestions: s
                    .suggestions()
                    .iter()
                    .map(|suggestion| SuggestionCard {
                        id: suggestion.id,
                        origin: suggestion.origin_text.clone(),
                        proposed: suggestion.proposed_text.clone(),
                        rationale: suggestion.rationale.clone(),
                        mode: s.mode(suggestion.id),
                        draft: s.draft(suggestion.id).map(str::to_string),
                        diff: s.preview(suggestion.id).unwrap_or_default(),
                    })
                    .collect(),
            }),
            logs: self.logs.as_ref().map(|l| LogSnapshot {
                link: l.link(),
                lines: l.lines().map(str::to_string).collect(),
            }),
            notifications: self.notifications.items().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::channel::{Address, ChannelEventKind, MemoryConnector};
    use crate::core::SessionPhase;

    fn desk() -> ReviewDesk<MemoryConnector> {
        ReviewDesk::new(MemoryConnector::new(), DeskOptions::default())
    }

    /// 选择文档与人物，并让两个通道都连上、文档收到首次推送
    fn ready(text: &str) -> ReviewDesk<MemoryConnector> {
        let mut desk = desk();
        desk.select_document(DocId(1));
        desk.toggle_persona(Persona::new("editor"));
        let doc = desk.document().unwrap().channel_id().unwrap();
        let session = desk.session().unwrap().channel_id();
        desk.handle_event(ChannelEvent::opened(doc));
        desk.handle_event(ChannelEvent::message(doc, json!({"content": text}).to_string()));
        desk.handle_event(ChannelEvent::opened(session));
        desk
    }

    fn deliver(desk: &mut ReviewDesk<MemoryConnector>, frame: serde_json::Value) {
        let session = desk.session().unwrap().channel_id();
        desk.handle_event(ChannelEvent::message(session, frame.to_string()));
    }

    fn suggestion_channels(desk: &ReviewDesk<MemoryConnector>) -> Vec<Address> {
        desk.connector()
            .live_channels()
            .into_iter()
            .map(|(_, address)| address)
            .filter(|address| matches!(address, Address::Suggestions { .. }))
            .collect()
    }

    #[test]
    fn test_session_needs_persona_and_document() {
        let mut desk = desk();
        desk.toggle_persona(Persona::new("editor"));
        assert!(desk.session().is_none());
        desk.select_document(DocId(1));
        assert!(desk.session().is_some());
        assert_eq!(desk.request_next(Instant::now()), Err(ReviewError::ConnectionUnavailable));
        assert_eq!(desk.notifications().len(), 1);
    }

    #[test]
    fn test_persona_switch_leaves_one_channel() {
        let mut desk = ready("foo baz");
        deliver(&mut desk, json!({"content": "foo", "replacement": "bar", "reason": "p"}));
        assert_eq!(desk.session().unwrap().suggestions().len(), 1);

        desk.toggle_persona(Persona::new("P"));
        desk.toggle_persona(Persona::new("Q"));

        let channels = suggestion_channels(&desk);
        assert_eq!(
            channels,
            vec![Address::Suggestions {
                persona: Persona::new("Q"),
                document: DocId(1)
            }]
        );
        assert!(desk.session().unwrap().suggestions().is_empty());
    }

    #[test]
    fn test_toggle_same_persona_deselects() {
        let mut desk = ready("foo");
        desk.toggle_persona(Persona::new("editor"));
        assert!(desk.persona().is_none());
        assert!(desk.session().is_none());
        assert!(suggestion_channels(&desk).is_empty());
    }

    #[test]
    fn test_stale_events_are_dropped() {
        let mut desk = ready("foo baz");
        let old_session = desk.session().unwrap().channel_id();
        desk.toggle_persona(Persona::new("other"));

        desk.handle_event(ChannelEvent::message(
            old_session,
            json!({"content": "foo", "replacement": "bar", "reason": "stale"}).to_string(),
        ));
        assert!(desk.session().unwrap().suggestions().is_empty());
    }

    #[test]
    fn test_document_switch_rebuilds_session() {
        let mut desk = ready("foo");
        let old_doc = desk.document().unwrap().channel_id().unwrap();
        desk.select_document(DocId(2));

        assert!(!desk.connector().is_live(old_doc));
        let session = desk.session().unwrap();
        assert_eq!(session.document(), DocId(2));
        assert!(desk.document().unwrap().is_loading());
        let live = desk.connector().live_channels();
        assert_eq!(live.len(), 2);
    }

    #[test]
    fn test_end_to_end_accept() {
        let mut desk = ready("foo baz");
        desk.request_next(Instant::now()).unwrap();
        deliver(&mut desk, json!({"content": "foo", "replacement": "bar", "reason": "clarity"}));
        let id = desk.session().unwrap().suggestions()[0].id;

        desk.accept(id).unwrap();
        assert_eq!(desk.document().unwrap().content(), "bar baz");

        let session = desk.session().unwrap().channel_id();
        let frames = desk.connector_mut().sent_json(session);
        assert_eq!(
            frames,
            vec![
                json!({"action": "get_suggestion"}),
                json!({
                    "action": "accept_suggestion",
                    "suggestion": {"content": "foo", "replacement": "bar", "reason": "clarity"}
                }),
            ]
        );
    }

    #[test]
    fn test_exhausted_until_reselect() {
        let mut desk = ready("foo");
        desk.request_next(Instant::now()).unwrap();
        deliver(&mut desk, json!({"end": true, "message": "no more"}));
        assert_eq!(desk.session().unwrap().phase(), SessionPhase::Exhausted);

        let session = desk.session().unwrap().channel_id();
        assert_eq!(desk.request_next(Instant::now()), Err(ReviewError::Exhausted));
        assert_eq!(desk.connector_mut().sent(session).len(), 1);

        desk.toggle_persona(Persona::new("editor"));
        desk.toggle_persona(Persona::new("editor"));
        assert_eq!(desk.session().unwrap().phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_push_with_stale_suggestion() {
        let mut desk = ready("foo baz");
        desk.request_next(Instant::now()).unwrap();
        deliver(&mut desk, json!({"content": "foo", "replacement": "bar", "reason": "r"}));
        let doc = desk.document().unwrap().channel_id().unwrap();
        desk.handle_event(ChannelEvent::message(doc, json!({"content": "rewritten"}).to_string()));

        let id = desk.session().unwrap().suggestions()[0].id;
        let accepted = desk.accept(id).unwrap();
        assert!(!accepted.applied);
        assert_eq!(desk.document().unwrap().content(), "rewritten");
    }

    #[test]
    fn test_superseded_edit_warns() {
        let mut desk = ready("foo baz");
        deliver(&mut desk, json!({"content": "foo", "replacement": "bar", "reason": "r"}));
        let id = desk.session().unwrap().suggestions()[0].id;
        desk.accept(id).unwrap();

        let before = desk.notifications().len();
        let doc = desk.document().unwrap().channel_id().unwrap();
        desk.handle_event(ChannelEvent::message(doc, json!({"content": "foo baz"}).to_string()));
        assert_eq!(desk.notifications().len(), before + 1);
        assert_eq!(desk.document().unwrap().content(), "foo baz");
    }

    #[test]
    fn test_tick_times_out_request() {
        let mut desk = ready("foo");
        let start = Instant::now();
        desk.request_next(start).unwrap();
        assert!(!desk.tick(start + Duration::from_secs(1)));
        assert!(desk.tick(start + Duration::from_secs(31)));
        assert!(matches!(desk.session().unwrap().phase(), SessionPhase::Failed(_)));
    }

    #[test]
    fn test_reconnect_only_disconnected() {
        let mut desk = ready("foo");
        let session = desk.session().unwrap().channel_id();
        let doc = desk.document().unwrap().channel_id().unwrap();
        desk.handle_event(ChannelEvent::new(session, ChannelEventKind::Closed));

        desk.reconnect();
        assert_ne!(desk.session().unwrap().channel_id(), session);
        assert_eq!(desk.document().unwrap().channel_id(), Some(doc));
    }

    #[test]
    fn test_snapshot_projects_cards() {
        let mut desk = ready("foo baz");
        deliver(&mut desk, json!({"content": "foo", "replacement": "bar", "reason": "r"}));
        let id = desk.session().unwrap().suggestions()[0].id;
        desk.toggle_edit(id).unwrap();

        let snapshot = desk.snapshot();
        let card = &snapshot.session.unwrap().suggestions[0];
        assert_eq!(card.mode, DisplayMode::Edit);
        assert_eq!(card.draft.as_deref(), Some("bar"));
        assert_eq!(snapshot.document.unwrap().content, "foo baz");
    }
}
