//! Structured logging (§2.3): pretty stderr output by default, or
//! JSON-formatted output under `logs/<run-id>.log` when `log_to_file` is
//! set — mirroring the original's `JSONFormatter` for file sinks.

use std::path::Path;

use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, LogLevel};
use crate::error::{AlertMagnetError, Result};

pub fn init(config: &AppConfig, run_id: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(config.log_level)));

    if config.log_to_file {
        let logs_dir = Path::new("logs");
        std::fs::create_dir_all(logs_dir)
            .map_err(|e| AlertMagnetError::filesystem(logs_dir.display().to_string(), e))?;
        let path = logs_dir.join(format!("{run_id}.log"));
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| AlertMagnetError::filesystem(path.display().to_string(), e))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_writer(file)
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .init();
    }

    Ok(())
}

fn level_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warning => "warn",
        LogLevel::Error | LogLevel::Critical => "error",
    }
}
