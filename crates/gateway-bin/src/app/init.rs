//! Gateway startup and shutdown.

use credential_storage::CredentialStore;
use gateway_config_and_utils::{Config, Paths};
use jira_actions::{build_registry, install, load_icon_base64};
use plugin_bus::{BusResult, DispatchSettings, Dispatcher, MessageBus, PluginServer, RedisBus};
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{error, info};

/// Run the gateway until ctrl-c or until the bus subscriptions end.
pub async fn run_gateway(config: Config, paths: Paths) -> anyhow::Result<()> {
    info!(
        plugin_id = %config.plugin_id,
        prefixes = ?config.subject_prefixes,
        handshake_delay_ms = config.handshake_delay_ms,
        "Starting Jira gateway"
    );

    let credentials_path = config.credentials_path(&paths);
    let store = Arc::new(CredentialStore::open(credentials_path)?);

    let bus: Arc<dyn MessageBus> = Arc::new(RedisBus::connect(&config.redis_url).await?);

    let dispatcher = Arc::new(Dispatcher::new(
        bus.clone(),
        store.clone(),
        DispatchSettings {
            job_channel_prefix: config.job_channel_prefix.clone(),
            handshake_delay: config.handshake_delay(),
            retained_ttl: config.retained_ttl(),
        },
    ));

    let registry = Arc::new(build_registry()?);
    let server = Arc::new(PluginServer::new(
        bus,
        config.plugin_id.clone(),
        config.subject_prefixes.clone(),
        registry,
        dispatcher,
    ));
    install(&server, store.clone(), load_icon_base64(&paths.icon_file())).await;

    let running = server.clone();
    let mut serve = tokio::spawn(async move { running.run().await });

    tokio::select! {
        joined = &mut serve => return finish(&store, joined),
        _ = tokio::signal::ctrl_c() => {
            info!("Received ctrl-c, shutting down");
            server.shutdown();
        }
    }

    let joined = serve.await;
    finish(&store, joined)
}

/// Flush the store, then surface whatever ended the server.
fn finish(
    store: &CredentialStore,
    joined: Result<BusResult<()>, JoinError>,
) -> anyhow::Result<()> {
    if let Err(e) = store.flush() {
        error!(error = %e, "Failed to flush credential store");
    }

    match joined {
        Ok(Ok(())) => {
            info!("Jira gateway stopped");
            Ok(())
        }
        Ok(Err(e)) => {
            error!(error = %e, "Plugin server failed");
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}
