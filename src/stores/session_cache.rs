use crate::core::error::{RecordedError, SyncError};
use crate::models::config::TransmissionConfig;
use crate::models::session::{SessionInfo, SessionStats};
use crate::rpc::transport::{RpcTransport, TransportSettings};
use crate::stores::error_slot::ErrorSlot;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;
use tracing::{debug, info};

/// Last good session info and stats
pub struct SessionCache {
    transport: Arc<RpcTransport>,
    info: watch::Sender<Option<Arc<SessionInfo>>>,
    stats: watch::Sender<Option<Arc<SessionStats>>>,
    /// Locally persisted connection parameters
    connection: RwLock<Option<TransmissionConfig>>,
    /// Failures of `session-get`, `session-set` and other session calls
    info_errors: ErrorSlot,
    stats_errors: ErrorSlot,
}

impl SessionCache {
    pub fn new(transport: Arc<RpcTransport>) -> Self {
        let (info, _) = watch::channel(None);
        let (stats, _) = watch::channel(None);
        Self {
            transport,
            info,
            stats,
            connection: RwLock::new(None),
            info_errors: ErrorSlot::new("session"),
            stats_errors: ErrorSlot::new("session-stats"),
        }
    }

    pub fn info(&self) -> Option<Arc<SessionInfo>> {
        self.info.borrow().clone()
    }

    pub fn stats(&self) -> Option<Arc<SessionStats>> {
        self.stats.borrow().clone()
    }

    pub fn subscribe_info(&self) -> watch::Receiver<Option<Arc<SessionInfo>>> {
        self.info.subscribe()
    }

    pub fn subscribe_stats(&self) -> watch::Receiver<Option<Arc<SessionStats>>> {
        self.stats.subscribe()
    }

    /// Outstanding info error, else outstanding stats error
    pub fn last_error(&self) -> Option<RecordedError> {
        self.info_error().or_else(|| self.stats_error())
    }

    pub fn info_error(&self) -> Option<RecordedError> {
        self.info_errors.current()
    }

    pub fn stats_error(&self) -> Option<RecordedError> {
        self.stats_errors.current()
    }

    pub(crate) fn record_error(&self, error: &SyncError) {
        self.info_errors.record(error);
    }

    pub fn connection(&self) -> Option<TransmissionConfig> {
        self.connection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remember the connection config and point the transport at it
    pub fn set_connection(&self, config: Option<TransmissionConfig>) {
        let settings = config
            .as_ref()
            .map(TransportSettings::from_config)
            .unwrap_or_default();
        self.transport.update_settings(settings);

        *self.connection.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// Refresh session info; the previous value stays on failure
    pub async fn fetch_info(&self) -> bool {
        match self.try_fetch_info().await {
            Ok(()) => {
                self.info_errors.clear();
                true
            }
            Err(e) => {
                self.info_errors.record(&e);
                false
            }
        }
    }

    async fn try_fetch_info(&self) -> Result<(), SyncError> {
        let fields = SessionInfo::requested_fields();
        let payload = self.transport.session_get(Some(&fields)).await?;
        let mut info = SessionInfo::from_payload(payload)?;

        if let Some(config) = self.connection() {
            info.fill_connection_from(&SessionInfo::from_connection(&config));
        }

        debug!(version = info.version.as_deref().unwrap_or(""), "Session info refreshed");
        self.info.send_replace(Some(Arc::new(info)));
        Ok(())
    }

    /// Refresh session stats; the previous value stays on failure
    pub async fn fetch_stats(&self) -> bool {
        match self.try_fetch_stats().await {
            Ok(stats) => {
                self.stats.send_replace(Some(Arc::new(stats)));
                self.stats_errors.clear();
                true
            }
            Err(e) => {
                self.stats_errors.record(&e);
                false
            }
        }
    }

    async fn try_fetch_stats(&self) -> Result<SessionStats, SyncError> {
        let payload = self.transport.session_stats().await?;
        SessionStats::from_payload(payload)
    }

    /// Apply a partial settings change.
    ///
    /// The merge is visible immediately and is kept even if the daemon
    /// rejects the change. Connection fields retarget the transport before
    /// the request goes out.
    pub async fn update_settings(&self, patch: &SessionInfo) -> bool {
        match self.try_update_settings(patch).await {
            Ok(()) => self.fetch_info().await,
            Err(e) => {
                self.info_errors.record(&e);
                false
            }
        }
    }

    async fn try_update_settings(&self, patch: &SessionInfo) -> Result<(), SyncError> {
        // Without a fetched baseline only a reconnect makes sense
        let mut merged = match (self.info(), self.connection()) {
            (Some(current), _) => (*current).clone(),
            (None, _) if !patch.touches_connection() => return Err(SyncError::MissingSessionInfo),
            (None, Some(config)) => SessionInfo::from_connection(&config),
            (None, None) => SessionInfo::default(),
        };
        merged.merge(patch)?;
        self.info.send_replace(Some(Arc::new(merged.clone())));

        if patch.touches_connection() {
            let config = merged.connection_config();
            info!(
                url = config.as_ref().map(|c| c.url.as_str()).unwrap_or("<none>"),
                "Connection settings changed"
            );
            self.set_connection(config);
        }

        self.transport.session_set(patch.daemon_arguments()?).await
    }
}
