use anyhow::{Context, Result};
use axum::serve;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{debug, error, info, warn, Level};
use transmission_sync::api::config_client::ConfigClient;
use transmission_sync::core::config::{Config, StoreConfig};
use transmission_sync::core::error::ConnectionFailure;
use transmission_sync::core::state::{AppState, SyncEngine};
use transmission_sync::core::{routes, startup, tracing_init};
use transmission_sync::security::rate_limiter::RateLimiter;
use transmission_sync::stores::config_store::ConfigStore;
use transmission_sync::sync::poller::ConnectionHealth;
use transmission_sync::utils::format::{format_bytes, format_duration, format_speed};
use transmission_sync::utils::time::current_timestamp;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let config_path = if args.len() > 1 {
        PathBuf::from(&args[1])
    } else {
        PathBuf::from("config.toml")
    };

    // Load and validate configuration
    let config = Config::from_file(&config_path).context(format!(
        "Failed to load configuration from '{}'. \
        If this is your first run, copy config.example.toml to config.toml and adjust the values.",
        config_path.display()
    ))?;

    tracing_init::init_tracing(&config.logging)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.num_threads)
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    runtime.block_on(async_main(config, config_path))
}

async fn async_main(config: Config, config_path: PathBuf) -> Result<()> {
    info!(
        config_path = %config_path.display(),
        num_threads = config.server.num_threads,
        store_enabled = config.store.enabled,
        config_service = %config.client.config_service,
        poll_interval_secs = config.client.poll_interval,
        log_level = %config.logging.level,
        "transmission-sync starting"
    );

    let store_handle = if config.store.enabled {
        Some(spawn_config_service(&config.store).await?)
    } else {
        None
    };

    let engine = SyncEngine::new(&config.client).context("Failed to create sync engine")?;
    let client = ConfigClient::new(
        &config.client.config_service,
        Duration::from_secs(config.client.request_timeout),
    )
    .context("Failed to create config service client")?;

    if let Err(e) = startup::connect(&engine, &client, config.daemon.as_ref()).await {
        match e.downcast_ref::<ConnectionFailure>() {
            Some(failure) => error!(reason = %failure, "Could not connect to Transmission"),
            None => error!(error = %e, "Could not connect to Transmission"),
        }
        return Err(e);
    }

    let poll_handle = engine.poller.start()?;
    spawn_reporter(engine.clone());

    info!(
        torrents = engine.torrents.len(),
        "transmission-sync startup complete"
    );

    shutdown_signal().await;

    poll_handle.stop();
    if let Some(handle) = store_handle {
        match handle.await {
            Ok(Err(e)) => error!(error = %e, "Config service task failed"),
            Err(e) => error!(error = %e, "Config service task panicked"),
            Ok(Ok(())) => {}
        }
    }

    info!("Shutting down gracefully");

    Ok(())
}

/// Serve the config persistence service in the background
async fn spawn_config_service(store_config: &StoreConfig) -> Result<JoinHandle<Result<()>>> {
    let store = ConfigStore::open(store_config.path.clone())
        .context("Failed to open config store")?;
    let state = Arc::new(AppState::new(store_config, store));

    spawn_rate_limit_cleanup(Arc::clone(&state.rate_limiter), store_config.rate_limit_window);

    let app = routes::build_router(state).layer(
        ServiceBuilder::new().layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        ),
    );

    let addr = format!("127.0.0.1:{}", store_config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind config service to {}", addr))?;

    info!(address = %addr, path = %store_config.path.display(), "Config service listening");

    Ok(tokio::spawn(async move {
        serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Config service error")
    }))
}

/// Periodically drop rate limit windows that have expired
fn spawn_rate_limit_cleanup(rate_limiter: Arc<RateLimiter>, window: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(window));

        loop {
            interval.tick().await;
            rate_limiter.cleanup_old_entries(current_timestamp());
            debug!(tracked_clients = rate_limiter.len(), "Rate limit cleanup completed");
        }
    });
}

/// Log what the caches publish
fn spawn_reporter(engine: SyncEngine) {
    let mut stats_rx = engine.session.subscribe_stats();
    let mut health_rx = engine.poller.subscribe_health();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = stats_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let stats = stats_rx.borrow_and_update().clone();
                    if let Some(stats) = stats {
                        info!(
                            torrents = stats.torrent_count,
                            active = stats.active_torrent_count,
                            paused = stats.paused_torrent_count,
                            download = %format_speed(stats.download_speed),
                            upload = %format_speed(stats.upload_speed),
                            downloaded_total = %format_bytes(stats.cumulative_stats.downloaded_bytes),
                            uploaded_total = %format_bytes(stats.cumulative_stats.uploaded_bytes),
                            session_uptime = %format_duration(stats.current_stats.seconds_active as i64),
                            "Session stats"
                        );
                    }
                }
                changed = health_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let health = *health_rx.borrow_and_update();
                    if health == ConnectionHealth::Lost {
                        let last_error = engine
                            .torrents
                            .last_error()
                            .or_else(|| engine.session.last_error())
                            .map(|e| e.message)
                            .unwrap_or_default();
                        warn!(
                            error = %last_error,
                            "Lost connection to Transmission. Reset the stored configuration \
                            (DELETE /config) or update the connection settings, then restart"
                        );
                    }
                }
            }
        }
    });
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
