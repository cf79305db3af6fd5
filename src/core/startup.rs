use anyhow::{anyhow, bail, Context, Result};
use tracing::{info, warn};

use crate::api::config_client::ConfigClient;
use crate::core::config::DaemonConfig;
use crate::core::state::SyncEngine;
use crate::models::config::TransmissionConfig;

/// Point the engine at `config`, or back to unconfigured
pub fn apply_connection(engine: &SyncEngine, config: Option<TransmissionConfig>) {
    engine.session.set_connection(config);
}

/// Try the config stored by the config service.
///
/// A stored config that no longer connects is cleared so the next start
/// falls through to first-time setup. Returns whether a connection was made.
pub async fn connect_with_stored_config(engine: &SyncEngine, client: &ConfigClient) -> Result<bool> {
    let Some(stored) = client.get().await else {
        info!("No stored connection config");
        return Ok(false);
    };

    apply_connection(engine, Some(stored.clone()));

    match engine.transport.test_connection().await {
        Ok(_) => {
            info!(url = %stored.url, port = stored.port, "Connected with stored config");
            Ok(true)
        }
        Err(failure) => {
            warn!(
                url = %stored.url,
                port = stored.port,
                error = %failure,
                "Stored config failed to connect, clearing it"
            );
            apply_connection(engine, None);
            if let Err(e) = client.clear().await {
                warn!(error = %e, "Failed to clear stored config");
            }
            Ok(false)
        }
    }
}

/// Test `config` against the daemon and persist it on success.
///
/// A failed test returns the `ConnectionFailure` inside the error so callers
/// can tell bad credentials from an unreachable daemon.
pub async fn first_time_setup(
    engine: &SyncEngine,
    client: &ConfigClient,
    config: TransmissionConfig,
) -> Result<TransmissionConfig> {
    config
        .validate()
        .map_err(|e| anyhow!("Invalid connection config: {}", e))?;

    apply_connection(engine, Some(config.clone()));

    if let Err(failure) = engine.transport.test_connection().await {
        apply_connection(engine, None);
        return Err(anyhow::Error::new(failure));
    }

    let stored = client
        .save(&config)
        .await
        .context("Failed to save connection config")?;

    info!(url = %stored.url, port = stored.port, "Connection config saved");
    Ok(stored)
}

/// Forget the stored config and disconnect the engine
pub async fn reset_configuration(engine: &SyncEngine, client: &ConfigClient) -> Result<()> {
    client.clear().await.context("Failed to clear stored config")?;
    apply_connection(engine, None);
    info!("Connection config reset");
    Ok(())
}

/// Stored config first, then the `[daemon]` section
pub async fn connect(engine: &SyncEngine, client: &ConfigClient, daemon: Option<&DaemonConfig>) -> Result<()> {
    if connect_with_stored_config(engine, client).await? {
        return Ok(());
    }

    let Some(daemon) = daemon else {
        bail!("No working stored config and no [daemon] section for first-time setup");
    };

    first_time_setup(engine, client, daemon.to_transmission_config()).await?;
    Ok(())
}
