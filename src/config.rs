//! Configuration loader (§6): reads the `[AlertMagnet]` section of an
//! INI file into a typed `AppConfig`, applying the defaults from the
//! external-interfaces key table. Any problem here is fatal — the
//! pipeline does not start with a partially-valid config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;

use crate::error::{AlertMagnetError, Result};

const SECTION: &str = "AlertMagnet";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Maps to the `tracing` level this variant corresponds to.
    pub fn as_tracing_level(self) -> tracing::Level {
        match self {
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warning => tracing::Level::WARN,
            Self::Error | Self::Critical => tracing::Level::ERROR,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_endpoint: String,
    pub cert: Option<String>,
    pub timeout: Duration,
    pub directory_path: PathBuf,
    pub threshold_days: Option<u64>,
    pub delay: Duration,
    pub cores: usize,
    pub max_long_term_storage: String,
    pub prometheus_port: u16,
    pub naptime_seconds: u64,
    pub log_to_file: bool,
    pub log_level: LogLevel,
}

/// Loads and validates configuration from `config_file`. Fails fast with
/// a fatal `AlertMagnetError` variant (see `is_fatal_config_error`) before
/// any query, compaction, or correlation work starts.
pub fn load_config(config_file: &Path) -> Result<AppConfig> {
    if !config_file.is_file() {
        return Err(AlertMagnetError::ConfigFileNotExists(
            config_file.display().to_string(),
        ));
    }

    let ini = Ini::load_from_file(config_file)
        .map_err(|e| AlertMagnetError::Other(format!("malformed ini file: {e}")))?;
    let section = ini.section(Some(SECTION)).ok_or_else(|| {
        AlertMagnetError::RequiredConfigKeyNotFound(format!("[{SECTION}] section"))
    })?;

    let get = |key: &str| -> Option<&str> { section.get(key).filter(|v| !v.is_empty()) };
    let required = |key: &str| -> Result<String> {
        get(key)
            .map(str::to_string)
            .ok_or_else(|| AlertMagnetError::RequiredConfigKeyNotFound(key.to_string()))
    };
    let parse_or_default = |key: &str, default: u64| -> Result<u64> {
        match get(key) {
            None => Ok(default),
            Some(v) => v.parse().map_err(|_| AlertMagnetError::InvalidConfigValue {
                key: key.to_string(),
                value: v.to_string(),
            }),
        }
    };

    let api_endpoint = required("api_endpoint")?;
    let cert = get("cert").map(str::to_string);

    let timeout_secs = parse_or_default("timeout", 30)?;
    let directory_path = PathBuf::from(get("directory_path").unwrap_or("data"));

    let threshold_days = match get("threshold") {
        None => None,
        Some(v) => Some(
            v.parse()
                .map_err(|_| AlertMagnetError::InvalidConfigValue {
                    key: "threshold".to_string(),
                    value: v.to_string(),
                })?,
        ),
    };

    let delay_secs: f64 = match get("delay") {
        None => 0.25,
        Some(v) => v.parse().map_err(|_| AlertMagnetError::InvalidConfigValue {
            key: "delay".to_string(),
            value: v.to_string(),
        })?,
    };

    let cores = parse_or_default("cores", 12)? as usize;
    let max_long_term_storage = get("max_long_term_storage")
        .unwrap_or("1y")
        .to_string();
    let prometheus_port = parse_or_default("prometheus_port", 8123)? as u16;
    let naptime_seconds = parse_or_default("naptime_seconds", 86_400)?;
    let log_to_file = get("log_to_file").is_some_and(|v| v.eq_ignore_ascii_case("true"));

    let log_level = match section.get("log_level") {
        Some("DEBUG") => LogLevel::Debug,
        Some("INFO") => LogLevel::Info,
        Some("WARNING") => LogLevel::Warning,
        Some("ERROR") => LogLevel::Error,
        Some("CRITICAL") => LogLevel::Critical,
        other => {
            return Err(AlertMagnetError::InvalidConfigValue {
                key: "log_level".to_string(),
                value: other.unwrap_or("").to_string(),
            });
        }
    };

    Ok(AppConfig {
        api_endpoint,
        cert,
        timeout: Duration::from_secs(timeout_secs),
        directory_path,
        threshold_days,
        delay: Duration::from_secs_f64(delay_secs),
        cores,
        max_long_term_storage,
        prometheus_port,
        naptime_seconds,
        log_to_file,
        log_level,
    })
}
