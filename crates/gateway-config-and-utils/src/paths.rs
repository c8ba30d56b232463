//! File system paths for the gateway.
//!
//! Everything lives under one base directory, which defaults to the process
//! working directory so the credentials file sits next to the plugin binary.

use crate::config::DEFAULT_CREDENTIALS_FILE_NAME;
use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages file system paths for the gateway.
#[derive(Debug, Clone)]
pub struct Paths {
    base_dir: PathBuf,
}

impl Paths {
    /// Create a Paths instance rooted at the current working directory.
    pub fn new() -> CoreResult<Self> {
        let base_dir = std::env::current_dir().map_err(CoreError::WorkingDir)?;
        Ok(Self { base_dir })
    }

    /// Create a Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory.
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Gateway configuration file (`<base>/config.json`).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Default credential collection file (`<base>/jira_credentials.json`).
    pub fn credentials_file(&self) -> PathBuf {
        self.base_dir.join(DEFAULT_CREDENTIALS_FILE_NAME)
    }

    /// Logs directory (`<base>/logs`).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// JSONL log file (`<base>/logs/gateway.jsonl`).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("gateway.jsonl")
    }

    /// Plugin icon shown in the intro (`<base>/docs/jira_icon.png`).
    pub fn icon_file(&self) -> PathBuf {
        self.base_dir.join("docs").join("jira_icon.png")
    }

    /// Ensure the base and logs directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
