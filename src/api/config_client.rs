use crate::models::config::TransmissionConfig;
use anyhow::{bail, Context, Result};
use std::time::Duration;
use tracing::{debug, warn};

/// Client for the credential persistence service
pub struct ConfigClient {
    client: reqwest::Client,
    endpoint: String,
}

impl ConfigClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/config", base_url.trim_end_matches('/')),
        })
    }

    /// Stored config, if any.
    ///
    /// A non-2xx answer, a `null` body or an unreachable service all mean
    /// there is nothing stored.
    pub async fn get(&self) -> Option<TransmissionConfig> {
        let response = match self.client.get(&self.endpoint).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, endpoint = %self.endpoint, "Config service unreachable");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(status = %response.status(), "No stored config");
            return None;
        }

        match response.json::<Option<TransmissionConfig>>().await {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Config service returned an unreadable config");
                None
            }
        }
    }

    /// Persist `config`, returning what the service stored
    pub async fn save(&self, config: &TransmissionConfig) -> Result<TransmissionConfig> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(config)
            .send()
            .await
            .context("Failed to send config to config service")?;

        if !response.status().is_success() {
            bail!("Config service returned error status: {}", response.status());
        }

        response
            .json::<TransmissionConfig>()
            .await
            .context("Failed to parse stored config")
    }

    pub async fn clear(&self) -> Result<()> {
        let response = self
            .client
            .delete(&self.endpoint)
            .send()
            .await
            .context("Failed to send delete to config service")?;

        if !response.status().is_success() {
            bail!("Config service returned error status: {}", response.status());
        }

        Ok(())
    }
}
