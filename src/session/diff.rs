//! 词级 diff（预览模式用）
//!
//! 按「单词 / 空白串」切分后做 LCS；相邻同类片段合并。
//! 输入过大时退化为「整段删除 + 整段插入」。

/// 片段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    Equal,
    Removed,
    Inserted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSpan {
    pub kind: DiffKind,
    pub text: String,
}

/// LCS 表格上限（token 数乘积）
const MAX_TABLE_CELLS: usize = 250_000;

fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_space: Option<bool> = None;
    for (i, ch) in text.char_indices() {
        let space = ch.is_whitespace();
        if let Some(prev) = in_space {
            if prev != space {
                tokens.push(&text[start..i]);
                start = i;
            }
        }
        in_space = Some(space);
    }
    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}

fn push_span(spans: &mut Vec<DiffSpan>, kind: DiffKind, text: &str) {
    if text.is_empty() {
        return;
    }
    match spans.last_mut() {
        Some(last) if last.kind == kind => last.text.push_str(text),
        _ => spans.push(DiffSpan {
            kind,
            text: text.to_string(),
        }),
    }
}

pub fn word_diff(old: &str, new: &str) -> Vec<DiffSpan> {
    let a = tokenize(old);
    let b = tokenize(new);
    let mut spans = Vec::new();

    if a.len().saturating_mul(b.len()) > MAX_TABLE_CELLS {
        push_span(&mut spans, DiffKind::Removed, old);
        push_span(&mut spans, DiffKind::Inserted, new);
        return spans;
    }

    // lcs[i][j] = a[i..] 与 b[j..] 的 LCS 长度
    let width = b.len() + 1;
    let mut lcs = vec![0u32; (a.len() + 1) * width];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            lcs[i * width + j] = if a[i] == b[j] {
                lcs[(i + 1) * width + j + 1] + 1
            } else {
                lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            push_span(&mut spans, DiffKind::Equal, a[i]);
            i += 1;
            j += 1;
        } else if lcs[(i + 1) * width + j] >= lcs[i * width + j + 1] {
            push_span(&mut spans, DiffKind::Removed, a[i]);
            i += 1;
        } else {
            push_span(&mut spans, DiffKind::Inserted, b[j]);
            j += 1;
        }
    }
    for token in &a[i..] {
        push_span(&mut spans, DiffKind::Removed, token);
    }
    for token in &b[j..] {
        push_span(&mut spans, DiffKind::Inserted, token);
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(kind: DiffKind, text: &str) -> DiffSpan {
        DiffSpan {
            kind,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_single_word_change() {
        assert_eq!(
            word_diff("foo baz", "bar baz"),
            vec![
                span(DiffKind::Removed, "foo"),
                span(DiffKind::Inserted, "bar"),
                span(DiffKind::Equal, " baz"),
            ]
        );
    }

    #[test]
    fn test_identical() {
        assert_eq!(word_diff("same text", "same text"), vec![span(DiffKind::Equal, "same text")]);
    }

    #[test]
    fn test_empty_sides() {
        assert_eq!(word_diff("", "new"), vec![span(DiffKind::Inserted, "new")]);
        assert_eq!(word_diff("old", ""), vec![span(DiffKind::Removed, "old")]);
        assert!(word_diff("", "").is_empty());
    }

    #[test]
    fn test_tokenize_keeps_whitespace() {
        assert_eq!(tokenize("a  b\nc"), vec!["a", "  ", "b", "\n", "c"]);
    }
}
