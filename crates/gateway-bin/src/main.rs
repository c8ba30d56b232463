//! Jira plugin gateway: serves Jira actions to tenants over the message bus.

mod app;

use std::path::PathBuf;

use clap::Parser;
use gateway_config_and_utils::{init_logging, Config, Paths};

/// Jira plugin gateway command-line interface.
#[derive(Parser, Debug)]
#[command(name = "jira-gateway")]
#[command(about = "Jira plugin gateway for the message bus")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Base directory for runtime files (config, logs, credentials). Defaults to the working directory
    #[arg(long, env = "JIRA_GATEWAY_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Redis connection URL
    #[arg(long)]
    redis_url: Option<String>,

    /// Plugin identifier segment in inbound subjects
    #[arg(long)]
    plugin_id: Option<String>,

    /// Credential collection file
    #[arg(long)]
    credentials_file: Option<PathBuf>,

    /// Pause between a handshake ack and execution, in milliseconds (0 disables)
    #[arg(long)]
    handshake_delay_ms: Option<u64>,
}

impl Cli {
    /// Command-line flags win over the config file and environment.
    fn apply(&self, config: &mut Config) {
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(url) = &self.redis_url {
            config.redis_url = url.clone();
        }
        if let Some(plugin_id) = &self.plugin_id {
            config.plugin_id = plugin_id.clone();
        }
        if let Some(path) = &self.credentials_file {
            config.credentials_file = Some(path.clone());
        }
        if let Some(ms) = self.handshake_delay_ms {
            config.handshake_delay_ms = ms;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match &cli.base_dir {
        Some(base) => Paths::with_base_dir(base.clone()),
        None => Paths::new()?,
    };
    let mut config = Config::load(&paths)?;
    cli.apply(&mut config);
    config.validate()?;

    paths.ensure_dirs()?;
    init_logging(&config.log_level, &paths);

    app::run_gateway(config, paths).await
}
