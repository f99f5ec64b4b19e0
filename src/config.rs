//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `REDLINE__*` 覆盖（双下划线表示嵌套，如 `REDLINE__SERVER__BASE_URL=https://review.example.com`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub documents: DocumentsSection,
    #[serde(default)]
    pub logs: LogsSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// [server] 段：后端地址与各通道路径模板
///
/// 路径模板中的 `{document}` / `{persona}` 在建立通道时替换。
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// 后端地址；可带 http:// 或 https:// 前缀，https 时通道走 wss
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_document_path")]
    pub document_path: String,
    #[serde(default = "default_suggestion_path")]
    pub suggestion_path: String,
    #[serde(default = "default_log_path")]
    pub log_path: String,
}

fn default_base_url() -> String {
    "localhost:8080".to_string()
}

fn default_document_path() -> String {
    "/api/document/{document}".to_string()
}

fn default_suggestion_path() -> String {
    "/ws/conversation/{persona}/{document}".to_string()
}

fn default_log_path() -> String {
    "/api/logs".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            document_path: default_document_path(),
            suggestion_path: default_suggestion_path(),
            log_path: default_log_path(),
        }
    }
}

impl ServerSection {
    /// 拆出 (是否 TLS, 主机部分)
    fn split_scheme(&self) -> (bool, &str) {
        let base = self.base_url.trim().trim_end_matches('/');
        if let Some(host) = base.strip_prefix("https://") {
            (true, host)
        } else if let Some(host) = base.strip_prefix("http://") {
            (false, host)
        } else {
            (false, base)
        }
    }

    /// REST 请求用的基地址（如 `http://localhost:8080`）
    pub fn http_base(&self) -> String {
        match self.split_scheme() {
            (true, host) => format!("https://{}", host),
            (false, host) => format!("http://{}", host),
        }
    }

    /// 通道用的基地址（如 `ws://localhost:8080`）
    pub fn ws_base(&self) -> String {
        match self.split_scheme() {
            (true, host) => format!("wss://{}", host),
            (false, host) => format!("ws://{}", host),
        }
    }
}

/// [session] 段：请求超时、UI 刷新间隔、通知上限
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSection {
    /// 单次建议请求的等待上限（秒），超时进入 Failed
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
    #[serde(default = "default_max_notifications")]
    pub max_notifications: usize,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_tick_millis() -> u64 {
    250
}

fn default_max_notifications() -> usize {
    20
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            tick_millis: default_tick_millis(),
            max_notifications: default_max_notifications(),
        }
    }
}

/// [documents] 段：可选择的文档槽位
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentsSection {
    #[serde(default = "default_slots")]
    pub slots: Vec<u32>,
}

fn default_slots() -> Vec<u32> {
    vec![1, 2]
}

impl Default for DocumentsSection {
    fn default() -> Self {
        Self {
            slots: default_slots(),
        }
    }
}

/// [logs] 段：实时日志缓冲行数
#[derive(Debug, Clone, Deserialize)]
pub struct LogsSection {
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
}

fn default_max_lines() -> usize {
    2000
}

impl Default for LogsSection {
    fn default() -> Self {
        Self {
            max_lines: default_max_lines(),
        }
    }
}

/// [logging] 段：本地日志输出
///
/// TUI 占用终端，日志默认写文件；`file` 留空时写 stderr。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
    /// 默认过滤级别，RUST_LOG 优先
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("redline.log"))
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            level: default_log_level(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            session: SessionSection::default(),
            documents: DocumentsSection::default(),
            logs: LogsSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 REDLINE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 REDLINE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("REDLINE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn server(base_url: &str) -> ServerSection {
        ServerSection {
            base_url: base_url.to_string(),
            ..ServerSection::default()
        }
    }

    #[test]
    fn test_ws_base_follows_scheme() {
        assert_eq!(server("localhost:8080").ws_base(), "ws://localhost:8080");
        assert_eq!(server("http://review.local/").ws_base(), "ws://review.local");
        assert_eq!(server("https://abc.ngrok.app").ws_base(), "wss://abc.ngrok.app");
        assert_eq!(server("https://abc.ngrok.app").http_base(), "https://abc.ngrok.app");
        assert_eq!(server("localhost:8080").http_base(), "http://localhost:8080");
    }

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.session.request_timeout_secs, 30);
        assert_eq!(cfg.documents.slots, vec![1, 2]);
        assert_eq!(cfg.server.suggestion_path, "/ws/conversation/{persona}/{document}");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[server]\nbase_url = \"https://remote.example\"\n\n[documents]\nslots = [1, 2, 3]\n\n[session]\nrequest_timeout_secs = 5"
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.server.base_url, "https://remote.example");
        assert_eq!(cfg.documents.slots, vec![1, 2, 3]);
        assert_eq!(cfg.session.request_timeout_secs, 5);
        assert_eq!(cfg.logs.max_lines, 2000);
    }
}
