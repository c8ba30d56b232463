//! Logging initialization for the gateway.
//!
//! Thin wrapper over the observability crate so every entry point logs the
//! same way: compact stderr output plus a JSONL file under `<base>/logs`.

use crate::Paths;
use observability::LogConfig;

/// Initialize logging for the gateway service.
///
/// `RUST_LOG` takes precedence over `level`.
pub fn init_logging(level: &str, paths: &Paths) {
    init_logging_for_service("jira-gateway", level, paths);
}

/// Initialize logging with a custom service name.
pub fn init_logging_for_service(service_name: &str, level: &str, paths: &Paths) {
    observability::init_with_config(LogConfig {
        service_name: service_name.into(),
        default_level: level.into(),
        log_path: Some(paths.log_file()),
        also_stderr: true,
    });
}
