use serde::{Deserialize, Serialize};

/// Raw status code reported by the daemon for a torrent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum TorrentStatus {
    Stopped = 0,
    QueuedVerify = 1,
    Verifying = 2,
    QueuedDownload = 3,
    Downloading = 4,
    QueuedSeed = 5,
    Seeding = 6,
}

impl TryFrom<i64> for TorrentStatus {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Stopped),
            1 => Ok(Self::QueuedVerify),
            2 => Ok(Self::Verifying),
            3 => Ok(Self::QueuedDownload),
            4 => Ok(Self::Downloading),
            5 => Ok(Self::QueuedSeed),
            6 => Ok(Self::Seeding),
            other => Err(format!("unknown torrent status code {}", other)),
        }
    }
}

impl From<TorrentStatus> for i64 {
    fn from(status: TorrentStatus) -> Self {
        status as i64
    }
}

impl Default for TorrentStatus {
    fn default() -> Self {
        Self::Stopped
    }
}

/// Status shown to the user, derived from several torrent fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectiveStatus {
    Stopped,
    QueuedVerify,
    Verifying,
    QueuedDownload,
    Downloading,
    QueuedSeed,
    Seeding,
    Stalled,
    CheckingMetadata,
    Error,
}

impl From<TorrentStatus> for EffectiveStatus {
    fn from(status: TorrentStatus) -> Self {
        match status {
            TorrentStatus::Stopped => Self::Stopped,
            TorrentStatus::QueuedVerify => Self::QueuedVerify,
            TorrentStatus::Verifying => Self::Verifying,
            TorrentStatus::QueuedDownload => Self::QueuedDownload,
            TorrentStatus::Downloading => Self::Downloading,
            TorrentStatus::QueuedSeed => Self::QueuedSeed,
            TorrentStatus::Seeding => Self::Seeding,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TorrentFile {
    pub name: String,
    pub length: u64,
    pub bytes_completed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TorrentFileStat {
    pub wanted: bool,
    /// -1 low, 0 normal, 1 high
    pub priority: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PeerInfo {
    pub address: String,
    pub port: u16,
    pub client_name: String,
    pub rate_to_client: u64,
    pub rate_to_peer: u64,
    pub is_encrypted: bool,
    #[serde(rename = "isUTP")]
    pub is_utp: bool,
    pub is_incoming: bool,
    pub is_downloading_from: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerStats {
    pub id: i64,
    pub host: String,
    pub announce: String,
    pub last_announce_succeeded: bool,
    pub last_announce_result: String,
    pub seeder_count: i64,
    pub leecher_count: i64,
}

/// One transfer job on the daemon, as returned by `torrent-get`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Torrent {
    pub id: i64,
    pub name: String,
    pub status: TorrentStatus,
    pub error: i64,
    pub error_string: String,
    pub total_size: u64,
    pub size_when_done: u64,
    pub left_until_done: u64,
    pub percent_done: f64,
    pub metadata_percent_complete: f64,
    pub recheck_progress: f64,
    pub downloaded_ever: u64,
    pub uploaded_ever: u64,
    pub upload_ratio: f64,
    pub rate_download: u64,
    pub rate_upload: u64,
    /// Seconds remaining, -1 when unknown or infinite
    pub eta: i64,
    pub queue_position: i64,
    pub peers_connected: u32,
    pub peers_getting_from_us: u32,
    pub peers_sending_to_us: u32,
    pub added_date: i64,
    pub download_dir: String,
    pub is_finished: bool,
    pub is_stalled: bool,
    pub labels: Vec<String>,
    pub files: Vec<TorrentFile>,
    pub file_stats: Vec<TorrentFileStat>,
    pub peers: Vec<PeerInfo>,
    pub tracker_stats: Vec<TrackerStats>,
}

impl Default for Torrent {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            status: TorrentStatus::Stopped,
            error: 0,
            error_string: String::new(),
            total_size: 0,
            size_when_done: 0,
            left_until_done: 0,
            percent_done: 0.0,
            // Daemons that omit the field have complete metadata
            metadata_percent_complete: 1.0,
            recheck_progress: 0.0,
            downloaded_ever: 0,
            uploaded_ever: 0,
            upload_ratio: 0.0,
            rate_download: 0,
            rate_upload: 0,
            eta: -1,
            queue_position: 0,
            peers_connected: 0,
            peers_getting_from_us: 0,
            peers_sending_to_us: 0,
            added_date: 0,
            download_dir: String::new(),
            is_finished: false,
            is_stalled: false,
            labels: Vec::new(),
            files: Vec::new(),
            file_stats: Vec::new(),
            peers: Vec::new(),
            tracker_stats: Vec::new(),
        }
    }
}

impl Torrent {
    /// Fields requested on every collection fetch
    pub const FIELDS: &'static [&'static str] = &[
        "id",
        "name",
        "status",
        "error",
        "errorString",
        "totalSize",
        "sizeWhenDone",
        "leftUntilDone",
        "percentDone",
        "metadataPercentComplete",
        "recheckProgress",
        "downloadedEver",
        "uploadedEver",
        "uploadRatio",
        "rateDownload",
        "rateUpload",
        "eta",
        "queuePosition",
        "peersConnected",
        "peersGettingFromUs",
        "peersSendingToUs",
        "addedDate",
        "downloadDir",
        "isFinished",
        "isStalled",
        "labels",
        "files",
        "fileStats",
        "peers",
        "trackerStats",
    ];

    /// Derive the user-facing status.
    ///
    /// Precedence: daemon error, incomplete metadata, stopped with its data
    /// gone, stalled while incomplete, then the raw status.
    pub fn effective_status(&self) -> EffectiveStatus {
        if self.error != 0 {
            return EffectiveStatus::Error;
        }

        if self.metadata_percent_complete < 1.0 {
            return EffectiveStatus::CheckingMetadata;
        }

        let complete = self.is_finished && self.left_until_done == 0;

        match self.status {
            TorrentStatus::Stopped => {
                if complete {
                    return EffectiveStatus::Stopped;
                }
                // Data was downloaded once but nothing of it is left on disk
                if self.downloaded_ever > 0 && self.left_until_done == self.size_when_done {
                    return EffectiveStatus::Error;
                }
                EffectiveStatus::Stopped
            }
            TorrentStatus::Downloading | TorrentStatus::Seeding => {
                if complete {
                    return self.status.into();
                }
                if self.is_stalled && !self.is_finished {
                    return EffectiveStatus::Stalled;
                }
                self.status.into()
            }
            other => other.into(),
        }
    }

    pub fn has_aligned_file_stats(&self) -> bool {
        self.files.len() == self.file_stats.len()
    }

    /// ETA used for ordering: unknown sorts after every known value
    pub fn eta_sort_key(&self) -> f64 {
        if self.eta < 0 {
            f64::INFINITY
        } else {
            self.eta as f64
        }
    }
}
