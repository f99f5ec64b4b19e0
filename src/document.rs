//! 文档视图：最近一次全文推送 + 本地乐观替换
//!
//! 推送无条件获胜：on_push 丢弃自上次推送以来的所有本地替换。
//! 本地替换只改第一处字面匹配，找不到时静默不变。

use crate::channel::{
    frame::decode_document_push, Address, Channel, ChannelEventKind, ChannelId, Connector, DocId,
    LinkState,
};
use crate::core::Notice;

/// 尚未被推送确认的本地替换
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEdit {
    pub origin: String,
    pub replacement: String,
}

impl LocalEdit {
    /// 推送文本是否已体现这次替换
    fn is_reflected_in(&self, text: &str) -> bool {
        if self.replacement.is_empty() {
            !text.contains(&self.origin)
        } else {
            text.contains(&self.replacement)
        }
    }
}

/// 一次推送的结果：被推送覆盖且未体现的本地替换
#[derive(Debug, Default)]
pub struct PushOutcome {
    pub superseded: Vec<LocalEdit>,
}

/// 文档视图，独占一个文档通道
#[derive(Debug)]
pub struct DocumentView {
    selector: DocId,
    channel: Option<Channel>,
    link: LinkState,
    loading: bool,
    content: String,
    unconfirmed: Vec<LocalEdit>,
}

impl DocumentView {
    pub fn open(selector: DocId, connector: &mut dyn Connector) -> Self {
        let mut view = Self {
            selector,
            channel: None,
            link: LinkState::Connecting,
            loading: true,
            content: String::new(),
            unconfirmed: Vec::new(),
        };
        view.connect(connector);
        view
    }

    /// 切换文档：先关闭旧通道，再为新 id 打开
    pub fn select(&mut self, selector: DocId, connector: &mut dyn Connector) {
        tracing::info!(from = %self.selector, to = %selector, "Selecting document");
        self.close();
        self.selector = selector;
        self.content.clear();
        self.unconfirmed.clear();
        self.loading = true;
        self.connect(connector);
    }

    /// 为当前文档重建通道，内容保留到下次推送
    pub fn reconnect(&mut self, connector: &mut dyn Connector) {
        self.close();
        self.connect(connector);
    }

    pub fn close(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.close();
        }
        self.link = LinkState::Disconnected;
    }

    fn connect(&mut self, connector: &mut dyn Connector) {
        self.channel = Some(connector.open(&Address::Document(self.selector)));
        self.link = LinkState::Connecting;
    }

    pub fn selector(&self) -> DocId {
        self.selector
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn link(&self) -> LinkState {
        self.link
    }

    pub fn channel_id(&self) -> Option<ChannelId> {
        self.channel.as_ref().map(Channel::id)
    }

    pub fn unconfirmed_edits(&self) -> &[LocalEdit] {
        &self.unconfirmed
    }

    /// 替换第一处字面匹配；找不到（或 origin 为空）时内容不变，返回 false
    pub fn apply_local_substitution(&mut self, origin: &str, replacement: &str) -> bool {
        if origin.is_empty() {
            return false;
        }
        let Some(pos) = self.content.find(origin) else {
            tracing::debug!(document = %self.selector, "Substitution target not found");
            return false;
        };
        self.content.replace_range(pos..pos + origin.len(), replacement);
        self.unconfirmed.push(LocalEdit {
            origin: origin.to_string(),
            replacement: replacement.to_string(),
        });
        true
    }

    /// 全文推送：整体替换内容
    pub fn on_push(&mut self, text: String) -> PushOutcome {
        let superseded: Vec<LocalEdit> = self
            .unconfirmed
            .drain(..)
            .filter(|edit| !edit.is_reflected_in(&text))
            .collect();
        if self.loading {
            tracing::info!(document = %self.selector, bytes = text.len(), "Document loaded");
        }
        self.content = text;
        self.loading = false;
        PushOutcome { superseded }
    }

    /// 处理本通道的入站事件
    pub fn on_event(&mut self, kind: ChannelEventKind) -> Option<Notice> {
        self.link.observe(&kind);
        match kind {
            ChannelEventKind::Opened => None,
            ChannelEventKind::Message(text) => {
                let outcome = self.on_push(decode_document_push(&text));
                if outcome.superseded.is_empty() {
                    None
                } else {
                    Some(Notice::warning(
                        "Local edits superseded",
                        format!(
                            "Document {} was updated upstream; {} accepted edit(s) are not reflected",
                            self.selector,
                            outcome.superseded.len()
                        ),
                    ))
                }
            }
            ChannelEventKind::Closed => {
                self.loading = false;
                Some(Notice::error(
                    "Document disconnected",
                    format!("Document {} channel closed", self.selector),
                ))
            }
            ChannelEventKind::Error(reason) => {
                self.loading = false;
                Some(Notice::error(
                    "Connection error",
                    format!("Document {}: {}", self.selector, reason),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryConnector;

    fn loaded(text: &str) -> (DocumentView, MemoryConnector) {
        let mut connector = MemoryConnector::new();
        let mut view = DocumentView::open(DocId(1), &mut connector);
        view.on_event(ChannelEventKind::Opened);
        view.on_event(ChannelEventKind::Message(text.to_string()));
        (view, connector)
    }

    #[test]
    fn test_loading_until_first_push() {
        let mut connector = MemoryConnector::new();
        let mut view = DocumentView::open(DocId(1), &mut connector);
        assert!(view.is_loading());
        view.on_event(ChannelEventKind::Opened);
        assert!(view.is_loading());
        view.on_event(ChannelEventKind::Message(r#"{"content":"hello"}"#.into()));
        assert!(!view.is_loading());
        assert_eq!(view.content(), "hello");
    }

    #[test]
    fn test_substitution_first_occurrence_only() {
        let (mut view, _c) = loaded("foo and foo");
        assert!(view.apply_local_substitution("foo", "bar"));
        assert_eq!(view.content(), "bar and foo");
    }

    #[test]
    fn test_substitution_missing_is_noop() {
        let (mut view, _c) = loaded("alpha beta");
        assert!(!view.apply_local_substitution("gamma", "delta"));
        assert!(!view.apply_local_substitution("", "delta"));
        assert_eq!(view.content(), "alpha beta");
        assert!(view.unconfirmed_edits().is_empty());
    }

    #[test]
    fn test_push_discards_local_edits() {
        let (mut view, _c) = loaded("foo baz");
        view.apply_local_substitution("foo", "bar");
        let outcome = view.on_push("foo baz qux".into());
        assert_eq!(view.content(), "foo baz qux");
        assert_eq!(outcome.superseded.len(), 1);
        assert!(view.unconfirmed_edits().is_empty());
    }

    #[test]
    fn test_push_reflecting_edit_is_quiet() {
        let (mut view, _c) = loaded("foo baz");
        view.apply_local_substitution("foo", "bar");
        let notice = view.on_event(ChannelEventKind::Message("bar baz".into()));
        assert!(notice.is_none());
    }

    #[test]
    fn test_select_closes_previous_channel() {
        let mut connector = MemoryConnector::new();
        let mut view = DocumentView::open(DocId(1), &mut connector);
        let first = view.channel_id().unwrap();
        view.select(DocId(2), &mut connector);
        assert!(!connector.is_live(first));
        assert_eq!(
            connector.live_channels(),
            vec![(view.channel_id().unwrap(), Address::Document(DocId(2)))]
        );
        assert!(view.is_loading());
        assert_eq!(view.content(), "");
    }

    #[test]
    fn test_error_marks_disconnected() {
        let (mut view, _c) = loaded("x");
        let notice = view.on_event(ChannelEventKind::Error("reset".into()));
        assert_eq!(view.link(), LinkState::Disconnected);
        assert!(notice.is_some());
    }
}
