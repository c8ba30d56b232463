//! Logging setup for the Jira plugin gateway.
//!
//! [`init_with_config`] installs a `tracing` subscriber once per process.
//! Everything else just uses the `tracing` macros.
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "jira-gateway".into(),
//!     log_path: Some("logs/jira-gateway.jsonl".into()),
//!     ..Default::default()
//! });
//! ```

mod file_writer;
mod json_layer;

use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use file_writer::LogFile;
pub use json_layer::{JsonLayer, LogLine};

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Written into every JSONL line as `service`.
    pub service_name: String,
    /// Filter used when `RUST_LOG` is unset or invalid.
    pub default_level: String,
    /// JSONL output file. `None` disables file output.
    pub log_path: Option<PathBuf>,
    /// Compact human-readable output on stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "jira-gateway".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: true,
        }
    }
}

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber. Later calls do nothing.
///
/// An unopenable log file drops the file layer; the failure is logged through
/// stderr once the subscriber is up.
pub fn init_with_config(config: LogConfig) {
    let (log_file, open_error) = match config.log_path.as_deref().map(LogFile::open) {
        Some(Ok(file)) => (Some(file), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };

    let file_layer = log_file.map(|file| {
        JsonLayer::new(config.service_name.clone(), file).with_filter(filter(&config.default_level))
    });
    let stderr_layer = config.also_stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(filter(&config.default_level))
    });

    if tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .is_err()
    {
        return;
    }

    if let (Some(path), Some(e)) = (&config.log_path, open_error) {
        tracing::warn!(path = %path.display(), error = %e, "Log file unavailable, logging to stderr only");
    }
    tracing::debug!(service = %config.service_name, "Logging initialized");
}
