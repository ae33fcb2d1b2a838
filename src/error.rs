use crate::runner::types::TestSummary;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("You need to specify either a function path or --all to test all functions")]
    NoFunctions,

    #[error("配置错误: {0}")]
    Config(String),

    #[error("Project manifest not found (searched upwards from {0})")]
    ManifestNotFound(PathBuf),

    #[error("Output capture is already active")]
    CaptureActive,

    #[error("Failed to write test results to {path}: {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        /// 写入失败时已经完成的统计结果
        summary: TestSummary,
    },

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON 解析错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML 解析错误: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for HarnessError {
    fn from(err: anyhow::Error) -> Self {
        HarnessError::Other(err.to_string())
    }
}

/// Result type for fntest crate
pub type Result<T> = std::result::Result<T, HarnessError>;
