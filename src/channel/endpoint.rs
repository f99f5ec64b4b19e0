//! 地址 → WebSocket URL 解析
//!
//! 路径模板支持 `{document}` 与 `{persona}` 占位符；persona 按单个路径段做百分号编码。

use super::address::Address;
use crate::config::ServerSection;

/// 各通道族的 URL 模板
#[derive(Debug, Clone)]
pub struct Endpoints {
    ws_base: String,
    document_path: String,
    suggestion_path: String,
    log_path: String,
}

impl Endpoints {
    pub fn new(
        ws_base: impl Into<String>,
        document_path: impl Into<String>,
        suggestion_path: impl Into<String>,
        log_path: impl Into<String>,
    ) -> Self {
        Self {
            ws_base: ws_base.into().trim_end_matches('/').to_string(),
            document_path: document_path.into(),
            suggestion_path: suggestion_path.into(),
            log_path: log_path.into(),
        }
    }

    pub fn from_config(server: &ServerSection) -> Self {
        Self::new(
            server.ws_base(),
            server.document_path.clone(),
            server.suggestion_path.clone(),
            server.log_path.clone(),
        )
    }

    pub fn url(&self, address: &Address) -> String {
        let path = match address {
            Address::Document(doc) => self.document_path.replace("{document}", &doc.to_string()),
            Address::Suggestions { persona, document } => self
                .suggestion_path
                .replace("{persona}", &encode_segment(persona.as_str()))
                .replace("{document}", &document.to_string()),
            Address::Logs => self.log_path.clone(),
        };
        if path.starts_with('/') {
            format!("{}{}", self.ws_base, path)
        } else {
            format!("{}/{}", self.ws_base, path)
        }
    }
}

/// 路径段百分号编码：保留 RFC 3986 unreserved 字符，其余按 UTF-8 字节编码
fn encode_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
