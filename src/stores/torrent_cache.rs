use crate::core::error::{RecordedError, SyncError};
use crate::models::rpc::AddTorrent;
use crate::models::torrent::{Torrent, TorrentStatus};
use crate::rpc::transport::RpcTransport;
use crate::stores::error_slot::ErrorSlot;
use crate::stores::selection::{ClickModifier, Selection};
use crate::stores::view::{self, Filter, SortSpec, TorrentMap};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Snapshot of all torrents on the daemon, replaced wholesale on each fetch
pub struct TorrentCache {
    transport: Arc<RpcTransport>,
    torrents: watch::Sender<Arc<TorrentMap>>,
    selection: Mutex<Selection>,
    /// Sequence number handed to the next fetch
    issued: AtomicU64,
    /// Sequence number of the state currently in `torrents`
    applied: Mutex<u64>,
    errors: ErrorSlot,
}

impl TorrentCache {
    pub fn new(transport: Arc<RpcTransport>) -> Self {
        let (torrents, _rx) = watch::channel(Arc::new(TorrentMap::new()));
        Self {
            transport,
            torrents,
            selection: Mutex::new(Selection::default()),
            issued: AtomicU64::new(0),
            applied: Mutex::new(0),
            errors: ErrorSlot::new("torrents"),
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<TorrentMap> {
        Arc::clone(&self.torrents.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<TorrentMap>> {
        self.torrents.subscribe()
    }

    pub fn get_torrent(&self, id: i64) -> Option<Arc<Torrent>> {
        self.torrents.borrow().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.torrents.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.torrents.borrow().is_empty()
    }

    pub fn last_error(&self) -> Option<RecordedError> {
        self.errors.current()
    }

    pub fn subscribe_errors(&self) -> watch::Receiver<Option<RecordedError>> {
        self.errors.subscribe()
    }

    pub(crate) fn record_error(&self, error: &SyncError) {
        self.errors.record(error);
    }

    /// Fetch every torrent and replace the snapshot.
    ///
    /// On failure the previous snapshot stays and the error is recorded.
    /// Returns whether the refresh succeeded.
    pub async fn fetch(&self) -> bool {
        match self.try_fetch().await {
            Ok(()) => {
                self.errors.clear();
                true
            }
            Err(e) => {
                self.errors.record(&e);
                false
            }
        }
    }

    async fn try_fetch(&self) -> Result<(), SyncError> {
        let seq = self.next_seq();
        let torrents = self.transport.torrent_get(Torrent::FIELDS).await?;
        self.apply_snapshot(seq, torrents);
        Ok(())
    }

    fn next_seq(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Install a fetched collection unless something newer was applied first
    fn apply_snapshot(&self, seq: u64, torrents: Vec<Torrent>) -> bool {
        let mut applied = lock(&self.applied);
        if seq <= *applied {
            debug!(seq, applied = *applied, "Discarding stale torrent snapshot");
            return false;
        }
        *applied = seq;

        let map: TorrentMap = torrents
            .into_iter()
            .inspect(|t| {
                if !t.has_aligned_file_stats() {
                    warn!(
                        torrent_id = t.id,
                        files = t.files.len(),
                        file_stats = t.file_stats.len(),
                        "File stats do not line up with files"
                    );
                }
            })
            .map(|t| (t.id, Arc::new(t)))
            .collect();

        let pruned = lock(&self.selection).retain(|id| map.contains_key(&id));
        if pruned > 0 {
            debug!(pruned, "Pruned selection of vanished torrents");
        }

        debug!(seq, torrents = map.len(), "Torrent snapshot applied");
        self.torrents.send_replace(Arc::new(map));
        true
    }

    /// Delete ids locally; fetches issued earlier can no longer resurrect them
    fn apply_removal(&self, ids: &[i64]) {
        let mut applied = lock(&self.applied);
        *applied = self.next_seq();

        self.torrents.send_modify(|current| {
            let mut map = (**current).clone();
            for id in ids {
                map.remove(id);
            }
            *current = Arc::new(map);
        });

        lock(&self.selection).retain(|id| !ids.contains(&id));
    }

    /// Run a refetch after a successful mutation, or record its failure
    pub(crate) async fn refetch_after(&self, result: Result<(), SyncError>) -> bool {
        match result {
            Ok(()) => self.fetch().await,
            Err(e) => {
                self.errors.record(&e);
                false
            }
        }
    }

    /// Add a torrent; it appears once the follow-up fetch lands
    pub async fn add(&self, add: &AddTorrent) -> bool {
        let result = self.transport.torrent_add(add).await.map(|_| ());
        if result.is_ok() {
            info!("Torrent added");
        }
        self.refetch_after(result).await
    }

    /// Remove torrents and drop them from the snapshot without waiting for a poll
    pub async fn remove(&self, ids: &[i64], delete_local_data: bool) -> bool {
        match self.transport.torrent_remove(ids, delete_local_data).await {
            Ok(()) => {
                self.apply_removal(ids);
                info!(ids = ?ids, delete_local_data, "Torrents removed");
                true
            }
            Err(e) => {
                self.errors.record(&e);
                false
            }
        }
    }

    pub async fn start(&self, ids: &[i64]) -> bool {
        let result = self.transport.torrent_start_now(ids).await;
        self.refetch_after(result).await
    }

    pub async fn stop(&self, ids: &[i64]) -> bool {
        let result = self.transport.torrent_stop(ids).await;
        self.refetch_after(result).await
    }

    /// Filtered and sorted display order
    pub fn view(&self, filter: &Filter, sort: &SortSpec) -> Vec<Arc<Torrent>> {
        view::project(&self.snapshot(), filter, sort)
    }

    pub fn status_counts(&self) -> BTreeMap<TorrentStatus, usize> {
        view::status_counts(&self.snapshot())
    }

    pub fn labels(&self) -> Vec<String> {
        view::all_labels(&self.snapshot())
    }

    pub fn selected_ids(&self) -> BTreeSet<i64> {
        lock(&self.selection).ids().clone()
    }

    /// Select exactly `ids`, ignoring any not in the snapshot
    pub fn set_selected(&self, ids: impl IntoIterator<Item = i64>) {
        let snapshot = self.snapshot();
        lock(&self.selection).set(ids.into_iter().filter(|id| snapshot.contains_key(id)));
    }

    pub fn clear_selected(&self) {
        lock(&self.selection).clear();
    }

    /// Apply a row click, resolving ranges against the current view.
    ///
    /// Clicks on ids missing from the snapshot leave the selection as is.
    pub fn click(&self, id: i64, modifier: ClickModifier, filter: &Filter, sort: &SortSpec) -> BTreeSet<i64> {
        let snapshot = self.snapshot();
        let mut selection = lock(&self.selection);
        if !snapshot.contains_key(&id) {
            debug!(id, "Ignoring click on unknown torrent");
            return selection.ids().clone();
        }

        let display = view::project(&snapshot, filter, sort);
        selection.click(id, modifier, &display);
        selection.ids().clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
