// Shared state for the config service and the sync engine

use crate::core::config::{ClientConfig, StoreConfig};
use crate::rpc::transport::RpcTransport;
use crate::security::rate_limiter::RateLimiter;
use crate::stores::{config_store::ConfigStore, session_cache::SessionCache, torrent_cache::TorrentCache};
use crate::sync::{mutations::Mutations, poller::PollScheduler};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

/// State shared by the config service handlers
#[derive(Clone)]
pub struct AppState {
    /// Persisted connection config
    pub store: Arc<ConfigStore>,

    /// Per-address request budget
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(config: &StoreConfig, store: ConfigStore) -> Self {
        Self {
            store: Arc::new(store),
            rate_limiter: Arc::new(RateLimiter::new(
                config.rate_limit_max_requests,
                config.rate_limit_window as i64,
            )),
        }
    }
}

/// Everything that talks to the daemon, wired to one shared transport
#[derive(Clone)]
pub struct SyncEngine {
    pub transport: Arc<RpcTransport>,
    pub session: Arc<SessionCache>,
    pub torrents: Arc<TorrentCache>,
    pub mutations: Arc<Mutations>,
    pub poller: Arc<PollScheduler>,
}

impl SyncEngine {
    /// Engine with an unconfigured transport; connect it through startup
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let transport = Arc::new(RpcTransport::unconfigured(Duration::from_secs(config.request_timeout))?);
        Ok(Self::with_transport(transport, config))
    }

    pub fn with_transport(transport: Arc<RpcTransport>, config: &ClientConfig) -> Self {
        let session = Arc::new(SessionCache::new(Arc::clone(&transport)));
        let torrents = Arc::new(TorrentCache::new(Arc::clone(&transport)));
        let mutations = Arc::new(Mutations::new(
            Arc::clone(&transport),
            Arc::clone(&torrents),
            Arc::clone(&session),
        ));
        let poller = Arc::new(PollScheduler::new(
            Arc::clone(&session),
            Arc::clone(&torrents),
            Duration::from_secs(config.poll_interval),
            config.max_failed_cycles,
        ));

        Self {
            transport,
            session,
            torrents,
            mutations,
            poller,
        }
    }
}
