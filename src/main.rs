//! Redline - 多人物文档审阅终端
//!
//! 入口：加载配置、初始化日志，然后按参数执行一次性后端操作或启动审阅 TUI。
//!
//! 用法：
//! - `redline`：启动 TUI
//! - `redline upload <slot> <file>`：上传文档到指定槽位
//! - `redline show <slot>`：打印文档当前全文
//! - `redline submit <file>`：提交纯文本
//! - `redline restart`：请求后端重启

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use redline::api::{Backend, HttpBackend};
use redline::channel::DocId;
use redline::config::{load_config, AppConfig};
use redline::core::spawn_desk;
use redline::ui::{run_app, App};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = std::env::var("REDLINE_CONFIG").ok().map(PathBuf::from);

    let (cfg, config_error) = match load_config(config_path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    let mut logging = cfg.logging.clone();
    if !args.is_empty() {
        // 子命令直接输出到终端
        logging.file = None;
    }
    redline::observability::init(&logging).context("Failed to initialize logging")?;
    if let Some(e) = config_error {
        tracing::warn!("Config load failed ({}), using defaults", e);
    }

    let backend = HttpBackend::new(&cfg.server);
    match args.first().map(String::as_str) {
        None => run_tui(cfg, Arc::new(backend)).await,
        Some("upload") => {
            let (Some(slot), Some(path)) = (args.get(1), args.get(2)) else {
                bail!("usage: redline upload <slot> <file>");
            };
            let slot: u32 = slot.parse().context("slot must be a number")?;
            let path = PathBuf::from(path);
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document".to_string());
            backend.upload_document(DocId(slot), &filename, bytes).await?;
            println!("Uploaded {} to document {}", filename, slot);
            Ok(())
        }
        Some("show") => {
            let Some(slot) = args.get(1) else {
                bail!("usage: redline show <slot>");
            };
            let slot: u32 = slot.parse().context("slot must be a number")?;
            let text = backend.document(DocId(slot)).await?;
            println!("{}", text);
            Ok(())
        }
        Some("submit") => {
            let Some(path) = args.get(1) else {
                bail!("usage: redline submit <file>");
            };
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path))?;
            backend.submit_text(&text).await?;
            println!("Submitted {} bytes", text.len());
            Ok(())
        }
        Some("restart") => {
            backend.restart().await?;
            println!("Restart requested");
            Ok(())
        }
        Some(other) => bail!(
            "unknown command: {} (expected upload, show, submit or restart)",
            other
        ),
    }
}

async fn run_tui(cfg: AppConfig, backend: Arc<dyn Backend>) -> anyhow::Result<()> {
    let (cmd_tx, state_rx) = spawn_desk(&cfg);
    let app = App::new(cfg.documents.slots.iter().copied().map(DocId).collect());

    run_app(app, backend, state_rx, cmd_tx)
        .await
        .context("App run failed")?;

    // 给主控循环一点时间关闭通道
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    Ok(())
}
