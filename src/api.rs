//! 后端 HTTP 接口：人物列表、文档快照、上传、重启
//!
//! 只覆盖边界调用，审阅流程本身走通道（见 channel）。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::channel::{DocId, Persona};
use crate::config::ServerSection;

/// 经 ngrok 暴露的后端会先返回浏览器警告页，带上此头跳过
const NGROK_SKIP_HEADER: &str = "ngrok-skip-browser-warning";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { status: u16, url: String },
}

/// 后端响应的统一外壳 `{"content": ...}`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    content: T,
}

#[derive(Debug, Serialize)]
struct TextUpload<'a> {
    text: &'a str,
}

/// 后端接口
#[async_trait]
pub trait Backend: Send + Sync {
    /// 可选人物（按后端给出的顺序）
    async fn personas(&self) -> Result<Vec<Persona>, ApiError>;

    /// 文档当前全文
    async fn document(&self, slot: DocId) -> Result<String, ApiError>;

    async fn upload_document(
        &self,
        slot: DocId,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ApiError>;

    async fn submit_text(&self, text: &str) -> Result<(), ApiError>;

    /// 让后端重启（丢弃服务端会话）
    async fn restart(&self) -> Result<(), ApiError>;
}

/// 基于 reqwest 的实现
pub struct HttpBackend {
    client: reqwest::Client,
    base: String,
    document_path: String,
}

impl HttpBackend {
    pub fn new(server: &ServerSection) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: server.http_base(),
            document_path: server.document_path.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn document_url(&self, slot: DocId) -> String {
        self.url(&self.document_path.replace("{document}", &slot.to_string()))
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            Err(ApiError::Status {
                status: status.as_u16(),
                url: resp.url().to_string(),
            })
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn personas(&self) -> Result<Vec<Persona>, ApiError> {
        let resp = self
            .client
            .get(self.url("/conversations"))
            .header(NGROK_SKIP_HEADER, "true")
            .send()
            .await?;
        let envelope: Envelope<Vec<String>> = Self::check(resp).await?.json().await?;
        tracing::info!(count = envelope.content.len(), "Personas loaded");
        Ok(envelope.content.into_iter().map(Persona::new).collect())
    }

    async fn document(&self, slot: DocId) -> Result<String, ApiError> {
        let resp = self
            .client
            .get(self.document_url(slot))
            .header(NGROK_SKIP_HEADER, "true")
            .send()
            .await?;
        let envelope: Envelope<String> = Self::check(resp).await?.json().await?;
        Ok(envelope.content)
    }

    async fn upload_document(
        &self,
        slot: DocId,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ApiError> {
        let size = bytes.len();
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("docNumber", slot.to_string());
        let resp = self
            .client
            .post(self.url("/api/upload_document"))
            .header(NGROK_SKIP_HEADER, "true")
            .multipart(form)
            .send()
            .await?;
        Self::check(resp).await?;
        tracing::info!(document = %slot, filename, size, "Document uploaded");
        Ok(())
    }

    async fn submit_text(&self, text: &str) -> Result<(), ApiError> {
        let resp = self
            .client
            .post(self.url("/api/upload_text"))
            .header(NGROK_SKIP_HEADER, "true")
            .json(&TextUpload { text })
            .send()
            .await?;
        Self::check(resp).await?;
        tracing::info!(bytes = text.len(), "Text submitted");
        Ok(())
    }

    async fn restart(&self) -> Result<(), ApiError> {
        let resp = self
            .client
            .post(self.url("/restart"))
            .header(NGROK_SKIP_HEADER, "true")
            .send()
            .await?;
        Self::check(resp).await?;
        tracing::warn!("Backend restart requested");
        Ok(())
    }
}
