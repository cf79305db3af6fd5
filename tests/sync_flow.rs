use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use transmission_sync::api::config_client::ConfigClient;
use transmission_sync::core::config::{ClientConfig, DaemonConfig, StoreConfig};
use transmission_sync::core::routes::build_router;
use transmission_sync::core::startup;
use transmission_sync::core::state::{AppState, SyncEngine};
use transmission_sync::models::torrent::EffectiveStatus;
use transmission_sync::rpc::transport::{RPC_PATH, SESSION_ID_HEADER};
use transmission_sync::stores::config_store::ConfigStore;
use transmission_sync::stores::view::{Filter, SortSpec};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "session-token-1";

fn ok(arguments: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"result": "success", "arguments": arguments}))
}

/// Daemon that demands a session id before answering anything
async fn start_daemon() -> MockServer {
    let daemon = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(RPC_PATH))
        .and(header(SESSION_ID_HEADER, TOKEN))
        .and(body_partial_json(json!({"method": "session-get"})))
        .respond_with(ok(json!({"version": "4.0.5", "download-dir": "/downloads"})))
        .mount(&daemon)
        .await;

    let counters = json!({
        "uploadedBytes": 1024,
        "downloadedBytes": 2048,
        "filesAdded": 2,
        "sessionCount": 1,
        "secondsActive": 60
    });
    Mock::given(method("POST"))
        .and(path(RPC_PATH))
        .and(header(SESSION_ID_HEADER, TOKEN))
        .and(body_partial_json(json!({"method": "session-stats"})))
        .respond_with(ok(json!({
            "activeTorrentCount": 1,
            "pausedTorrentCount": 1,
            "torrentCount": 2,
            "downloadSpeed": 300,
            "uploadSpeed": 100,
            "cumulative-stats": counters,
            "current-stats": counters
        })))
        .mount(&daemon)
        .await;

    Mock::given(method("POST"))
        .and(path(RPC_PATH))
        .and(header(SESSION_ID_HEADER, TOKEN))
        .and(body_partial_json(json!({"method": "torrent-get"})))
        .respond_with(ok(json!({"torrents": [
            {"id": 1, "name": "ubuntu.iso", "status": 4, "eta": 120, "labels": ["linux"]},
            {"id": 2, "name": "debian.iso", "status": 0, "percentDone": 1.0, "isFinished": true}
        ]})))
        .mount(&daemon)
        .await;

    Mock::given(method("POST"))
        .and(path(RPC_PATH))
        .and(header(SESSION_ID_HEADER, TOKEN))
        .and(body_partial_json(json!({"method": "torrent-remove"})))
        .respond_with(ok(json!({})))
        .mount(&daemon)
        .await;

    Mock::given(method("POST"))
        .and(path(RPC_PATH))
        .respond_with(ResponseTemplate::new(409).insert_header(SESSION_ID_HEADER, TOKEN))
        .with_priority(10)
        .mount(&daemon)
        .await;

    daemon
}

/// Serve the config service on an ephemeral port
async fn start_config_service(dir: &TempDir) -> String {
    let store = ConfigStore::open(dir.path().join("db.json")).unwrap();
    let app = build_router(Arc::new(AppState::new(&StoreConfig::default(), store)));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });

    format!("http://{}", addr)
}

fn client_config(config_service: &str) -> ClientConfig {
    ClientConfig {
        config_service: config_service.to_string(),
        poll_interval: 60,
        request_timeout: 5,
        max_failed_cycles: 3,
    }
}

#[tokio::test]
async fn test_first_run_then_restart_with_stored_config() {
    let daemon = start_daemon().await;
    let dir = TempDir::new().unwrap();
    let service = start_config_service(&dir).await;

    let daemon_section = DaemonConfig {
        url: daemon.address().ip().to_string(),
        port: daemon.address().port(),
        username: String::new(),
        password: String::new(),
        secure: false,
    };

    // First run: nothing stored, so the [daemon] section is tested and saved
    let engine = SyncEngine::new(&client_config(&service)).unwrap();
    let client = ConfigClient::new(&service, Duration::from_secs(5)).unwrap();
    startup::connect(&engine, &client, Some(&daemon_section)).await.unwrap();
    assert_eq!(engine.transport.session_id().as_deref(), Some(TOKEN));

    let stored = client.get().await.unwrap();
    assert_eq!(stored.port, daemon.address().port());

    // Second run: the stored config is enough
    let restarted = SyncEngine::new(&client_config(&service)).unwrap();
    assert!(startup::connect_with_stored_config(&restarted, &client).await.unwrap());
    assert!(restarted.transport.is_configured());
}

#[tokio::test]
async fn test_polling_fills_caches_and_mutations_reconcile() {
    let daemon = start_daemon().await;
    let dir = TempDir::new().unwrap();
    let service = start_config_service(&dir).await;

    let engine = SyncEngine::new(&client_config(&service)).unwrap();
    let client = ConfigClient::new(&service, Duration::from_secs(5)).unwrap();
    let daemon_section = DaemonConfig {
        url: daemon.address().ip().to_string(),
        port: daemon.address().port(),
        username: String::new(),
        password: String::new(),
        secure: false,
    };
    startup::connect(&engine, &client, Some(&daemon_section)).await.unwrap();

    let mut torrents_rx = engine.torrents.subscribe();
    let handle = engine.poller.start().unwrap();
    tokio::time::timeout(Duration::from_secs(5), torrents_rx.changed())
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let info = engine.session.info().unwrap();
    assert_eq!(info.download_dir.as_deref(), Some("/downloads"));
    assert_eq!(info.transmission_port, Some(daemon.address().port()));
    assert_eq!(engine.session.stats().unwrap().torrent_count, 2);

    let view = engine.torrents.view(&Filter::default(), &SortSpec::default());
    let names: Vec<&str> = view.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["debian.iso", "ubuntu.iso"]);
    assert_eq!(view[0].effective_status(), EffectiveStatus::Stopped);

    engine.torrents.set_selected([1, 2]);
    assert!(engine.mutations.remove(&[2], false).await);
    assert!(engine.torrents.get_torrent(2).is_none());
    assert_eq!(engine.torrents.selected_ids().into_iter().collect::<Vec<_>>(), vec![1]);

    handle.stop();
    assert!(!engine.poller.is_running());
}
