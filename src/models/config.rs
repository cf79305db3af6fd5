use serde::{Deserialize, Serialize};

/// Connection parameters persisted by the config service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransmissionConfig {
    /// Host name or address, without scheme
    pub url: String,
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub is_secure: bool,
}

impl TransmissionConfig {
    /// Reject configs the service must not store
    pub fn validate(&self) -> Result<(), String> {
        if self.url.trim().is_empty() {
            return Err("url must not be empty".to_string());
        }
        if self.port == 0 {
            return Err("port must be between 1 and 65535".to_string());
        }
        Ok(())
    }

    /// Host with the scheme implied by `is_secure`; an explicit scheme wins
    pub fn base_url(&self) -> String {
        if self.url.starts_with("http://") || self.url.starts_with("https://") {
            return self.url.clone();
        }
        let scheme = if self.is_secure { "https" } else { "http" };
        format!("{}://{}", scheme, self.url)
    }
}
