//! Configuration, paths, and logging setup for the Jira plugin gateway.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_CREDENTIALS_FILE_NAME, DEFAULT_HANDSHAKE_DELAY_MS, DEFAULT_JOB_CHANNEL_PREFIX,
    DEFAULT_LOG_LEVEL, DEFAULT_PLUGIN_ID, DEFAULT_REDIS_URL, DEFAULT_RETAINED_TTL_SECS,
    DEFAULT_SUBJECT_PREFIXES,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, init_logging_for_service};
pub use paths::Paths;
