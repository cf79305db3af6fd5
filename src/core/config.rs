use crate::models::config::TransmissionConfig;
use crate::rpc::transport::DEFAULT_PORT;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub client: ClientConfig,
    pub daemon: Option<DaemonConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
}

/// Config persistence sidecar
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_enabled")]
    pub enabled: bool,
    #[serde(default = "default_store_port")]
    pub port: u16,
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window: u64,
    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the config service
    pub config_service: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_max_failed_cycles")]
    pub max_failed_cycles: u32,
}

/// Connection used for first-time setup when nothing is stored yet
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    pub url: String,
    #[serde(default = "default_daemon_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub secure: bool,
}

impl DaemonConfig {
    pub fn to_transmission_config(&self) -> TransmissionConfig {
        TransmissionConfig {
            url: self.url.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            is_secure: self.secure,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_console")]
    pub console: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            num_threads: default_num_threads(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            enabled: default_store_enabled(),
            port: default_store_port(),
            path: default_store_path(),
            rate_limit_window: default_rate_limit_window(),
            rate_limit_max_requests: default_rate_limit_max_requests(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            console: default_console(),
        }
    }
}

// Default value functions
fn default_num_threads() -> usize {
    num_cpus::get()
}

fn default_store_enabled() -> bool {
    true
}

fn default_store_port() -> u16 {
    3000
}

fn default_store_path() -> PathBuf {
    PathBuf::from("db.json")
}

fn default_rate_limit_window() -> u64 {
    900 // 15 minutes
}

fn default_rate_limit_max_requests() -> u32 {
    100
}

fn default_poll_interval() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_failed_cycles() -> u32 {
    3
}

fn default_daemon_port() -> u16 {
    DEFAULT_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_console() -> bool {
    false
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.num_threads == 0 {
            bail!("num_threads must be greater than 0");
        }

        if self.store.enabled && self.store.port == 0 {
            bail!("Store port must be greater than 0");
        }

        if self.store.rate_limit_window == 0 {
            bail!("rate_limit_window must be greater than 0");
        }

        if self.store.rate_limit_max_requests == 0 {
            bail!("rate_limit_max_requests must be greater than 0");
        }

        if self.client.config_service.is_empty() {
            bail!("config_service must not be empty");
        }

        if self.client.poll_interval == 0 {
            bail!("poll_interval must be greater than 0");
        }

        if self.client.request_timeout == 0 {
            bail!("request_timeout must be greater than 0");
        }

        if self.client.max_failed_cycles == 0 {
            bail!("max_failed_cycles must be greater than 0");
        }

        if let Some(daemon) = &self.daemon {
            if let Err(e) = daemon.to_transmission_config().validate() {
                bail!("Invalid [daemon] section: {}", e);
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            bail!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            );
        }

        let valid_formats = ["json", "console"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            bail!(
                "Invalid log format '{}'. Must be one of: json, console",
                self.logging.format
            );
        }

        Ok(())
    }
}
