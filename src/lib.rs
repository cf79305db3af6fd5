pub mod core {
    pub mod config;
    pub mod error;
    pub mod routes;
    pub mod startup;
    pub mod state;
    pub mod tracing_init;
}

pub mod api {
    pub mod config_client;
}

pub mod handlers {
    pub mod config;
    pub mod fallback;
    pub mod health;
}

pub mod models {
    pub mod config;
    pub mod rpc;
    pub mod session;
    pub mod torrent;
}

pub mod rpc {
    pub mod methods;
    pub mod transport;
}

pub mod security {
    pub mod rate_limiter;
}

pub mod stores {
    pub mod config_store;
    pub mod error_slot;
    pub mod selection;
    pub mod session_cache;
    pub mod torrent_cache;
    pub mod view;
}

pub mod sync {
    pub mod mutations;
    pub mod poller;
}

pub mod utils {
    pub mod format;
    pub mod time;
}
