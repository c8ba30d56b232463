//! Errors raised while loading gateway settings.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// A setting is present but unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read config file {}: {source}", path.display())]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {} is not valid JSON: {source}", path.display())]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid redis_url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("working directory unavailable: {0}")]
    WorkingDir(#[source] std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
