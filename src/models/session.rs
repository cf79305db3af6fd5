use crate::core::error::SyncError;
use crate::models::config::TransmissionConfig;
use crate::rpc::transport::DEFAULT_PORT;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Expected JSON type of a session field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Bool,
    Number,
    Text,
}

impl Kind {
    fn matches(self, value: &Value) -> bool {
        match self {
            Kind::Bool => value.is_boolean(),
            Kind::Number => value.is_number(),
            Kind::Text => value.is_string(),
        }
    }
}

/// Daemon configuration fields requested by `session-get`, with their types
const DAEMON_FIELDS: &[(&str, Kind)] = &[
    ("alt-speed-down", Kind::Number),
    ("alt-speed-enabled", Kind::Bool),
    ("alt-speed-up", Kind::Number),
    ("alt-speed-time-enabled", Kind::Bool),
    ("alt-speed-time-begin", Kind::Number),
    ("alt-speed-time-end", Kind::Number),
    ("alt-speed-time-day", Kind::Number),
    ("download-dir", Kind::Text),
    ("download-queue-enabled", Kind::Bool),
    ("download-queue-size", Kind::Number),
    ("seed-queue-enabled", Kind::Bool),
    ("seed-queue-size", Kind::Number),
    ("queue-stalled-enabled", Kind::Bool),
    ("queue-stalled-minutes", Kind::Number),
    ("peer-port", Kind::Number),
    ("peer-port-random-on-start", Kind::Bool),
    ("port-forwarding-enabled", Kind::Bool),
    ("dht-enabled", Kind::Bool),
    ("pex-enabled", Kind::Bool),
    ("lpd-enabled", Kind::Bool),
    ("utp-enabled", Kind::Bool),
    ("rename-partial-files", Kind::Bool),
    ("cache-size-mb", Kind::Number),
    ("incomplete-dir", Kind::Text),
    ("incomplete-dir-enabled", Kind::Bool),
    ("start-added-torrents", Kind::Bool),
    ("speed-limit-down", Kind::Number),
    ("speed-limit-down-enabled", Kind::Bool),
    ("speed-limit-up", Kind::Number),
    ("speed-limit-up-enabled", Kind::Bool),
    ("port-is-open", Kind::Bool),
    ("version", Kind::Text),
];

/// Client-local connection fields; never part of the daemon's schema
const CONNECTION_FIELDS: &[(&str, Kind)] = &[
    ("transmission-url", Kind::Text),
    ("transmission-port", Kind::Number),
    ("transmission-username", Kind::Text),
    ("transmission-password", Kind::Text),
    ("transmission-secure", Kind::Bool),
];

/// Daemon configuration plus the connection parameters used to reach it.
///
/// Every field is optional so the same type doubles as a partial update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SessionInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transmission_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transmission_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transmission_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transmission_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transmission_secure: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_limit_down_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_limit_down: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_limit_up_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_limit_up: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_speed_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_speed_down: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_speed_up: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_speed_time_enabled: Option<bool>,
    /// Minutes after midnight
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_speed_time_begin: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_speed_time_end: Option<u32>,
    /// Day-of-week bitmask
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_speed_time_day: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_queue_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_queue_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_queue_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_queue_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_stalled_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_stalled_minutes: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_port_random_on_start: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_forwarding_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dht_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pex_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lpd_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utp_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_is_open: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rename_partial_files: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_size_mb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incomplete_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incomplete_dir_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_added_torrents: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl SessionInfo {
    /// Field list sent with `session-get`
    pub fn requested_fields() -> Vec<&'static str> {
        DAEMON_FIELDS.iter().map(|(name, _)| *name).collect()
    }

    /// Check the shape of a `session-get` payload and decode it.
    ///
    /// `version` must be present; every other known field must have the
    /// expected JSON type when present.
    pub fn from_payload(payload: Value) -> Result<Self, SyncError> {
        let object = payload
            .as_object()
            .ok_or_else(|| SyncError::Validation("session info is not an object".to_string()))?;

        if !object.get("version").is_some_and(Value::is_string) {
            return Err(SyncError::Validation(
                "session info is missing a string `version`".to_string(),
            ));
        }

        check_fields(object, DAEMON_FIELDS, "session info")?;
        check_fields(object, CONNECTION_FIELDS, "session info")?;

        serde_json::from_value(payload)
            .map_err(|e| SyncError::Validation(format!("invalid session info: {}", e)))
    }

    /// Whether this (partial) value touches the daemon connection parameters
    pub fn touches_connection(&self) -> bool {
        self.transmission_url.is_some()
            || self.transmission_port.is_some()
            || self.transmission_username.is_some()
            || self.transmission_password.is_some()
            || self.transmission_secure.is_some()
    }

    /// Overlay every field set in `patch` onto `self`
    pub fn merge(&mut self, patch: &SessionInfo) -> Result<(), SyncError> {
        let mut base = to_object(self)?;
        base.extend(to_object(patch)?);
        *self = serde_json::from_value(Value::Object(base)).map_err(SyncError::Decode)?;
        Ok(())
    }

    /// Fill connection fields the daemon response left empty
    pub fn fill_connection_from(&mut self, other: &SessionInfo) {
        if self.transmission_url.is_none() {
            self.transmission_url = other.transmission_url.clone();
        }
        if self.transmission_port.is_none() {
            self.transmission_port = other.transmission_port;
        }
        if self.transmission_username.is_none() {
            self.transmission_username = other.transmission_username.clone();
        }
        if self.transmission_password.is_none() {
            self.transmission_password = other.transmission_password.clone();
        }
        if self.transmission_secure.is_none() {
            self.transmission_secure = other.transmission_secure;
        }
    }

    /// Connection fields as a persisted config, `None` without a url
    pub fn connection_config(&self) -> Option<TransmissionConfig> {
        let url = self.transmission_url.clone().filter(|url| !url.is_empty())?;
        Some(TransmissionConfig {
            url,
            port: self.transmission_port.unwrap_or(DEFAULT_PORT),
            username: self.transmission_username.clone().unwrap_or_default(),
            password: self.transmission_password.clone().unwrap_or_default(),
            is_secure: self.transmission_secure.unwrap_or(false),
        })
    }

    /// Session info carrying only the connection fields of `config`
    pub fn from_connection(config: &TransmissionConfig) -> Self {
        Self {
            transmission_url: Some(config.url.clone()),
            transmission_port: Some(config.port),
            transmission_username: Some(config.username.clone()),
            transmission_password: Some(config.password.clone()),
            transmission_secure: Some(config.is_secure),
            ..Self::default()
        }
    }

    /// Arguments for `session-set`: the patch without client-local fields
    pub fn daemon_arguments(&self) -> Result<Value, SyncError> {
        let mut object = to_object(self)?;
        for (name, _) in CONNECTION_FIELDS {
            object.remove(*name);
        }
        Ok(Value::Object(object))
    }
}

fn to_object(info: &SessionInfo) -> Result<Map<String, Value>, SyncError> {
    match serde_json::to_value(info).map_err(SyncError::Decode)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

fn check_fields(object: &Map<String, Value>, fields: &[(&str, Kind)], what: &str) -> Result<(), SyncError> {
    for (name, kind) in fields {
        if let Some(value) = object.get(*name) {
            if !kind.matches(value) {
                return Err(SyncError::Validation(format!(
                    "{} field `{}` has unexpected type",
                    what, name
                )));
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferCounters {
    pub uploaded_bytes: u64,
    pub downloaded_bytes: u64,
    pub files_added: u64,
    pub session_count: u64,
    pub seconds_active: u64,
}

/// Aggregate transfer statistics from `session-stats`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub active_torrent_count: u32,
    pub paused_torrent_count: u32,
    pub torrent_count: u32,
    pub download_speed: u64,
    pub upload_speed: u64,
    #[serde(rename = "cumulative-stats")]
    pub cumulative_stats: TransferCounters,
    #[serde(rename = "current-stats")]
    pub current_stats: TransferCounters,
}

const STATS_NUMBERS: &[&str] = &[
    "activeTorrentCount",
    "downloadSpeed",
    "uploadSpeed",
    "pausedTorrentCount",
    "torrentCount",
];

impl SessionStats {
    /// Check the shape of a `session-stats` payload and decode it
    pub fn from_payload(payload: Value) -> Result<Self, SyncError> {
        let object = payload
            .as_object()
            .ok_or_else(|| SyncError::Validation("session stats is not an object".to_string()))?;

        for name in STATS_NUMBERS {
            if !object.get(*name).is_some_and(Value::is_number) {
                return Err(SyncError::Validation(format!(
                    "session stats is missing numeric `{}`",
                    name
                )));
            }
        }

        for name in ["cumulative-stats", "current-stats"] {
            if !object.get(name).is_some_and(Value::is_object) {
                return Err(SyncError::Validation(format!(
                    "session stats is missing `{}`",
                    name
                )));
            }
        }

        serde_json::from_value(payload)
            .map_err(|e| SyncError::Validation(format!("invalid session stats: {}", e)))
    }
}
