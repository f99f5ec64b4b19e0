//! 调和引擎：接受 / 拒绝 / 编辑待审建议
//!
//! 接受：先在本地文档上乐观替换，再移除建议与草稿，最后发送 accept 帧（发完即忘，无确认）。
//! 发送失败只产生通知，不回滚已应用的本地替换；直到下一次权威推送为止本地视图视为暂时正确。

use crate::channel::{
    frame::{ClientFrame, SuggestionPayload},
    ChannelError, LinkState,
};
use crate::core::ReviewError;
use crate::document::DocumentView;

use super::{word_diff, DiffSpan, DisplayMode, Suggestion, SuggestionId, SuggestionSession};

/// 一次接受的结果
#[derive(Debug)]
pub struct Accepted {
    pub suggestion: Suggestion,
    /// 实际写入文档的替换文本（草稿优先）
    pub replacement: String,
    /// 本地文档是否找到并替换了原文
    pub applied: bool,
    pub delivery: Result<(), ChannelError>,
}

impl SuggestionSession {
    pub fn mode(&self, id: SuggestionId) -> DisplayMode {
        if self.drafts.contains_key(&id) {
            DisplayMode::Edit
        } else {
            DisplayMode::Preview
        }
    }

    pub fn draft(&self, id: SuggestionId) -> Option<&str> {
        self.drafts.get(&id).map(String::as_str)
    }

    /// 有效替换文本：草稿优先，否则为原始建议
    pub fn effective_replacement(&self, id: SuggestionId) -> Option<&str> {
        self.drafts
            .get(&id)
            .map(String::as_str)
            .or_else(|| self.suggestion(id).map(|s| s.proposed_text.as_str()))
    }

    /// 预览用的词级 diff（原文 vs 有效替换）
    pub fn preview(&self, id: SuggestionId) -> Option<Vec<DiffSpan>> {
        let suggestion = self.suggestion(id)?;
        let replacement = self.effective_replacement(id)?;
        Some(word_diff(&suggestion.origin_text, replacement))
    }

    fn take_suggestion(&mut self, id: SuggestionId) -> Result<Suggestion, ReviewError> {
        let index = self
            .suggestions
            .iter()
            .position(|s| s.id == id)
            .ok_or(ReviewError::UnknownSuggestion(id))?;
        Ok(self.suggestions.remove(index))
    }

    /// 拒绝：只在本地移除，不发送任何帧
    pub fn reject(&mut self, id: SuggestionId) -> Result<Suggestion, ReviewError> {
        let suggestion = self.take_suggestion(id)?;
        self.drafts.remove(&id);
        tracing::debug!(session = %self.tag, suggestion = %id, "Suggestion rejected");
        Ok(suggestion)
    }

    /// 接受：乐观替换 → 移除 → 发送 accept 帧
    pub fn accept(
        &mut self,
        id: SuggestionId,
        document: &mut DocumentView,
    ) -> Result<Accepted, ReviewError> {
        let replacement = self
            .effective_replacement(id)
            .ok_or(ReviewError::UnknownSuggestion(id))?
            .to_string();
        let suggestion = self.suggestion(id).cloned().ok_or(ReviewError::UnknownSuggestion(id))?;

        let applied = document.apply_local_substitution(&suggestion.origin_text, &replacement);

        self.take_suggestion(id)?;
        self.drafts.remove(&id);

        let frame = ClientFrame::AcceptSuggestion {
            suggestion: SuggestionPayload {
                content: suggestion.origin_text.clone(),
                replacement: replacement.clone(),
                reason: suggestion.rationale.clone(),
            },
        };
        let delivery = if self.link == LinkState::Disconnected {
            Err(ChannelError::Closed)
        } else {
            self.channel.send_json(&frame)
        };
        if let Err(e) = &delivery {
            tracing::warn!(session = %self.tag, suggestion = %id, "Accept not delivered: {}", e);
        }
        tracing::info!(session = %self.tag, suggestion = %id, applied, "Suggestion accepted");

        Ok(Accepted {
            suggestion,
            replacement,
            applied,
            delivery,
        })
    }

    /// 预览 ⇄ 编辑；进入编辑时以当前有效替换为草稿种子，回到预览时丢弃草稿
    pub fn toggle_edit(&mut self, id: SuggestionId) -> Result<DisplayMode, ReviewError> {
        let proposed = self
            .suggestion(id)
            .map(|s| s.proposed_text.clone())
            .ok_or(ReviewError::UnknownSuggestion(id))?;
        if self.drafts.remove(&id).is_some() {
            Ok(DisplayMode::Preview)
        } else {
            self.drafts.insert(id, proposed);
            Ok(DisplayMode::Edit)
        }
    }

    /// 修改草稿文本（仅编辑模式）
    pub fn edit_draft(&mut self, id: SuggestionId, text: String) -> Result<(), ReviewError> {
        if self.suggestion(id).is_none() {
            return Err(ReviewError::UnknownSuggestion(id));
        }
        match self.drafts.get_mut(&id) {
            Some(draft) => {
                *draft = text;
                Ok(())
            }
            None => Err(ReviewError::NotEditing(id)),
        }
    }
}
