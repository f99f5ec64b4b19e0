//! 可观测性
//!
//! TUI 独占终端，因此日志写到配置的文件；未配置文件或文件打不开时写 stderr。

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingSection;

/// RUST_LOG 未设置时使用配置里的级别
fn env_filter(logging: &LoggingSection) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init(logging: &LoggingSection) -> anyhow::Result<()> {
    let (file, open_error) = match &logging.file {
        Some(path) => match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => (Some(file), None),
            Err(e) => (None, Some(format!("{}: {}", path.display(), e))),
        },
        None => (None, None),
    };

    let stderr_layer = file
        .is_none()
        .then(|| fmt::layer().with_writer(std::io::stderr));
    let file_layer = file.map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
    });

    tracing_subscriber::registry()
        .with(env_filter(logging))
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    if let Some(e) = open_error {
        tracing::warn!("Log file unavailable ({}), logging to stderr", e);
    }
    Ok(())
}
