//! Configuration management for the gateway.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default Redis URL for the message bus.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Plugin identifier used in inbound subjects (`<prefix>.bin.<tenant>.<plugin>.<path>`).
pub const DEFAULT_PLUGIN_ID: &str = "jira";

/// Subject prefixes the plugin listens under.
pub const DEFAULT_SUBJECT_PREFIXES: [&str; 2] = ["soren.v2", "soren.cpu"];

/// Prefix of handshake completion channels (`<prefix>.<jobId>`).
pub const DEFAULT_JOB_CHANNEL_PREFIX: &str = "soren.v2.jobs";

/// Compatibility delay between a handshake ack and its completion.
pub const DEFAULT_HANDSHAKE_DELAY_MS: u64 = 1000;

/// How long retained completion events stay replayable.
pub const DEFAULT_RETAINED_TTL_SECS: u64 = 300;

/// File name of the credential collection.
pub const DEFAULT_CREDENTIALS_FILE_NAME: &str = "jira_credentials.json";

/// Environment variable prefix for runtime overrides.
const ENV_PREFIX: &str = "JIRA_GATEWAY_";

/// Main gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Redis connection URL for the message bus.
    pub redis_url: String,
    /// Plugin identifier segment in inbound subjects.
    pub plugin_id: String,
    /// Subject prefixes to subscribe under.
    pub subject_prefixes: Vec<String>,
    /// Credential collection file. Defaults to `Paths::credentials_file`.
    pub credentials_file: Option<PathBuf>,
    /// Prefix of handshake completion channels.
    pub job_channel_prefix: String,
    /// Delay before publishing a handshake completion, in milliseconds. 0 disables.
    pub handshake_delay_ms: u64,
    /// TTL of retained completion events, in seconds.
    pub retained_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            plugin_id: DEFAULT_PLUGIN_ID.to_string(),
            subject_prefixes: DEFAULT_SUBJECT_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            credentials_file: None,
            job_channel_prefix: DEFAULT_JOB_CHANNEL_PREFIX.to_string(),
            handshake_delay_ms: DEFAULT_HANDSHAKE_DELAY_MS,
            retained_ttl_secs: DEFAULT_RETAINED_TTL_SECS,
        }
    }
}

impl Config {
    /// Load configuration from `<base>/config.json` if present, falling back
    /// to defaults, then apply `JIRA_GATEWAY_*` environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| CoreError::ParseConfig {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration to `<base>/config.json`.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}")).filter(|value| !value.trim().is_empty())
        };

        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = var("REDIS_URL") {
            self.redis_url = url;
        }
        if let Some(plugin_id) = var("PLUGIN_ID") {
            self.plugin_id = plugin_id;
        }
        if let Some(prefixes) = var("SUBJECT_PREFIXES") {
            self.subject_prefixes = prefixes
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(path) = var("CREDENTIALS_FILE") {
            self.credentials_file = Some(PathBuf::from(path));
        }
        if let Some(prefix) = var("JOB_CHANNEL_PREFIX") {
            self.job_channel_prefix = prefix;
        }
        if let Some(raw) = var("HANDSHAKE_DELAY_MS") {
            match raw.trim().parse() {
                Ok(ms) => self.handshake_delay_ms = ms,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid JIRA_GATEWAY_HANDSHAKE_DELAY_MS"),
            }
        }
        if let Some(raw) = var("RETAINED_TTL_SECS") {
            match raw.trim().parse() {
                Ok(secs) => self.retained_ttl_secs = secs,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid JIRA_GATEWAY_RETAINED_TTL_SECS"),
            }
        }
    }

    /// Reject configurations the gateway cannot start with.
    pub fn validate(&self) -> CoreResult<()> {
        if self.plugin_id.is_empty() || self.plugin_id.contains('.') {
            return Err(CoreError::Config(format!(
                "plugin_id must be a single non-empty subject segment, got '{}'",
                self.plugin_id
            )));
        }
        if self.subject_prefixes.is_empty() {
            return Err(CoreError::Config(
                "at least one subject prefix is required".to_string(),
            ));
        }
        if self.job_channel_prefix.is_empty() {
            return Err(CoreError::Config(
                "job_channel_prefix must not be empty".to_string(),
            ));
        }
        self.redis_url()?;
        Ok(())
    }

    /// Get the Redis URL as a parsed URL.
    pub fn redis_url(&self) -> CoreResult<Url> {
        Url::parse(&self.redis_url).map_err(CoreError::from)
    }

    /// Resolve the credential collection file against the given paths.
    pub fn credentials_path(&self, paths: &Paths) -> PathBuf {
        match &self.credentials_file {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => paths.base_dir().join(path),
            None => paths.credentials_file(),
        }
    }

    /// Handshake compatibility delay.
    pub fn handshake_delay(&self) -> Duration {
        Duration::from_millis(self.handshake_delay_ms)
    }

    /// Retained completion TTL.
    pub fn retained_ttl(&self) -> Duration {
        Duration::from_secs(self.retained_ttl_secs)
    }
}
