//! 逻辑地址与标识

use serde::{Deserialize, Serialize};

/// 文档槽位编号（如 1 / 2）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(pub u32);

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 审阅人物（不透明标识）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Persona(String);

impl Persona {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 通道逻辑地址
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// 文档全文推送通道
    Document(DocId),
    /// (persona, document) 建议通道
    Suggestions { persona: Persona, document: DocId },
    /// 实时日志通道
    Logs,
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Address::Document(doc) => write!(f, "document/{}", doc),
            Address::Suggestions { persona, document } => {
                write!(f, "suggestions/{}@{}", persona, document)
            }
            Address::Logs => write!(f, "logs"),
        }
    }
}
