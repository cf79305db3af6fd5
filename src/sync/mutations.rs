// Each operation pairs an RPC call with the matching cache reconciliation.
// Failures end up in the caches' error slots; callers only get a bool.

use crate::models::rpc::{AddTorrent, FreeSpace, QueueMove, TorrentProperties};
use crate::models::session::SessionInfo;
use crate::rpc::transport::RpcTransport;
use crate::stores::session_cache::SessionCache;
use crate::stores::torrent_cache::TorrentCache;
use std::sync::Arc;
use tracing::{debug, info};

pub struct Mutations {
    transport: Arc<RpcTransport>,
    torrents: Arc<TorrentCache>,
    session: Arc<SessionCache>,
}

impl Mutations {
    pub fn new(transport: Arc<RpcTransport>, torrents: Arc<TorrentCache>, session: Arc<SessionCache>) -> Self {
        Self {
            transport,
            torrents,
            session,
        }
    }

    /// Add a torrent; visible after the follow-up fetch
    pub async fn add(&self, add: &AddTorrent) -> bool {
        self.torrents.add(add).await
    }

    /// Remove torrents, dropping them locally right away
    pub async fn remove(&self, ids: &[i64], delete_local_data: bool) -> bool {
        self.torrents.remove(ids, delete_local_data).await
    }

    pub async fn start(&self, ids: &[i64]) -> bool {
        self.torrents.start(ids).await
    }

    pub async fn stop(&self, ids: &[i64]) -> bool {
        self.torrents.stop(ids).await
    }

    pub async fn verify(&self, ids: &[i64]) -> bool {
        let result = self.transport.torrent_verify(ids).await;
        self.torrents.refetch_after(result).await
    }

    /// Move (or just re-point) the data of `ids` to `location`
    pub async fn set_location(&self, ids: &[i64], location: &str, move_data: bool) -> bool {
        let result = self.transport.torrent_set_location(ids, location, move_data).await;
        if result.is_ok() {
            info!(ids = ?ids, location, move_data, "Torrent location changed");
        }
        self.torrents.refetch_after(result).await
    }

    pub async fn rename_path(&self, id: i64, path: &str, name: &str) -> bool {
        let result = self.transport.torrent_rename_path(&[id], path, name).await;
        self.torrents.refetch_after(result).await
    }

    pub async fn set_properties(&self, ids: &[i64], properties: &TorrentProperties) -> bool {
        let result = self.transport.torrent_set(ids, properties).await;
        self.torrents.refetch_after(result).await
    }

    pub async fn set_labels(&self, ids: &[i64], labels: Vec<String>) -> bool {
        let properties = TorrentProperties {
            labels: Some(labels),
            ..TorrentProperties::default()
        };
        self.set_properties(ids, &properties).await
    }

    /// Reorder the queue; positions of other torrents shift too, so refetch
    pub async fn queue_move(&self, ids: &[i64], direction: QueueMove) -> bool {
        let result = self.transport.queue_move(ids, direction).await;
        debug!(ids = ?ids, ?direction, "Queue move requested");
        self.torrents.refetch_after(result).await
    }

    /// Optimistically merge `patch` into the session info, then push it
    pub async fn update_session_settings(&self, patch: &SessionInfo) -> bool {
        self.session.update_settings(patch).await
    }

    /// Free space at `path`, or `None` with the error recorded
    pub async fn free_space(&self, path: &str) -> Option<FreeSpace> {
        match self.transport.free_space(path).await {
            Ok(space) => Some(space),
            Err(e) => {
                self.session.record_error(&e);
                None
            }
        }
    }
}
