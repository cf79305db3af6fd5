use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of every RPC request
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<&'a Value>,
    pub tag: u64,
}

/// Body of every RPC response
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    pub result: String,
    #[serde(default)]
    pub arguments: Option<Value>,
    #[serde(default)]
    pub tag: Option<u64>,
}

impl RpcResponse {
    pub const SUCCESS: &'static str = "success";

    pub fn is_success(&self) -> bool {
        self.result == Self::SUCCESS
    }
}

/// Source of a new torrent: a magnet/URL or the bytes of a .torrent file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TorrentSource {
    Filename(String),
    /// Base64-encoded metainfo
    Metainfo(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddTorrent {
    pub source: TorrentSource,
    pub download_dir: Option<String>,
    pub paused: Option<bool>,
}

impl AddTorrent {
    pub fn magnet(link: impl Into<String>) -> Self {
        Self {
            source: TorrentSource::Filename(link.into()),
            download_dir: None,
            paused: None,
        }
    }

    pub fn from_torrent_file(bytes: &[u8]) -> Self {
        Self {
            source: TorrentSource::Metainfo(STANDARD.encode(bytes)),
            download_dir: None,
            paused: None,
        }
    }

    pub fn with_download_dir(mut self, dir: impl Into<String>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }

    pub fn paused(mut self, paused: bool) -> Self {
        self.paused = Some(paused);
        self
    }

    pub fn to_arguments(&self) -> Value {
        let mut args = serde_json::Map::new();
        match &self.source {
            TorrentSource::Filename(name) => {
                args.insert("filename".to_string(), Value::from(name.as_str()));
            }
            TorrentSource::Metainfo(data) => {
                args.insert("metainfo".to_string(), Value::from(data.as_str()));
            }
        }
        if let Some(dir) = &self.download_dir {
            args.insert("download-dir".to_string(), Value::from(dir.as_str()));
        }
        if let Some(paused) = self.paused {
            args.insert("paused".to_string(), Value::from(paused));
        }
        Value::Object(args)
    }
}

/// Per-torrent settings applied through `torrent-set`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentProperties {
    #[serde(rename = "priority-high", skip_serializing_if = "Option::is_none")]
    pub priority_high: Option<Vec<usize>>,
    #[serde(rename = "priority-normal", skip_serializing_if = "Option::is_none")]
    pub priority_normal: Option<Vec<usize>>,
    #[serde(rename = "priority-low", skip_serializing_if = "Option::is_none")]
    pub priority_low: Option<Vec<usize>>,
    #[serde(rename = "files-wanted", skip_serializing_if = "Option::is_none")]
    pub files_wanted: Option<Vec<usize>>,
    #[serde(rename = "files-unwanted", skip_serializing_if = "Option::is_none")]
    pub files_unwanted: Option<Vec<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_limited: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_limited: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_ratio_limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_ratio_mode: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMove {
    Top,
    Up,
    Down,
    Bottom,
}

impl QueueMove {
    pub fn method(self) -> &'static str {
        match self {
            QueueMove::Top => "queue-move-top",
            QueueMove::Up => "queue-move-up",
            QueueMove::Down => "queue-move-down",
            QueueMove::Bottom => "queue-move-bottom",
        }
    }
}

/// Result of `free-space`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FreeSpace {
    pub path: String,
    #[serde(rename = "size-bytes")]
    pub size_bytes: u64,
    #[serde(rename = "total_size", default)]
    pub total_size: u64,
}

impl FreeSpace {
    pub fn used_bytes(&self) -> u64 {
        self.total_size.saturating_sub(self.size_bytes)
    }
}
