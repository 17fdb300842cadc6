use thiserror::Error;

/// Error taxonomy for the alertmagnet pipeline.
///
/// Config errors are fatal at startup; filesystem errors are logged and
/// swallowed per-artifact by the compactor/sink; `InvalidQueryQueue` is a
/// programmer error, not something a config mistake can trigger.
#[derive(Debug, Error)]
pub enum AlertMagnetError {
    #[error("config file does not exist: {0}")]
    ConfigFileNotExists(String),

    #[error("required config key not found: {0}")]
    RequiredConfigKeyNotFound(String),

    #[error("invalid config value for {key}: {value}")]
    InvalidConfigValue { key: String, value: String },

    #[error("invalid query queue: {0}")]
    InvalidQueryQueue(String),

    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("{0}")]
    Other(String),
}

impl AlertMagnetError {
    pub fn filesystem(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// True for the kinds that should abort the process before any work starts.
    pub fn is_fatal_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigFileNotExists(_)
                | Self::RequiredConfigKeyNotFound(_)
                | Self::InvalidConfigValue { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AlertMagnetError>;
