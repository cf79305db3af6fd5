// Typed wrappers over the daemon's RPC methods

use crate::core::error::{ConnectionFailure, SyncError};
use crate::models::rpc::{AddTorrent, FreeSpace, QueueMove, TorrentProperties};
use crate::models::torrent::Torrent;
use crate::rpc::transport::RpcTransport;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

#[derive(Deserialize)]
struct TorrentList {
    torrents: Vec<Value>,
}

impl RpcTransport {
    async fn call_arguments(&self, method: &str, arguments: Option<Value>) -> Result<Value, SyncError> {
        let response = self.call(method, arguments).await?;
        Ok(response.arguments.unwrap_or(Value::Null))
    }

    async fn call_ids(&self, method: &str, ids: &[i64]) -> Result<(), SyncError> {
        self.call(method, Some(json!({ "ids": ids }))).await?;
        Ok(())
    }

    /// `session-get`, optionally restricted to `fields`
    pub async fn session_get(&self, fields: Option<&[&str]>) -> Result<Value, SyncError> {
        let arguments = fields.map(|fields| json!({ "fields": fields }));
        self.call_arguments("session-get", arguments).await
    }

    pub async fn session_set(&self, settings: Value) -> Result<(), SyncError> {
        self.call("session-set", Some(settings)).await?;
        Ok(())
    }

    pub async fn session_stats(&self) -> Result<Value, SyncError> {
        self.call_arguments("session-stats", None).await
    }

    pub async fn torrent_get(&self, fields: &[&str]) -> Result<Vec<Torrent>, SyncError> {
        let arguments = self
            .call_arguments("torrent-get", Some(json!({ "fields": fields })))
            .await?;
        let list: TorrentList = serde_json::from_value(arguments)?;
        Ok(list.torrents.into_iter().filter_map(decode_torrent).collect())
    }

    pub async fn torrent_add(&self, add: &AddTorrent) -> Result<Value, SyncError> {
        self.call_arguments("torrent-add", Some(add.to_arguments())).await
    }

    pub async fn torrent_start_now(&self, ids: &[i64]) -> Result<(), SyncError> {
        self.call_ids("torrent-start-now", ids).await
    }

    pub async fn torrent_stop(&self, ids: &[i64]) -> Result<(), SyncError> {
        self.call_ids("torrent-stop", ids).await
    }

    pub async fn torrent_verify(&self, ids: &[i64]) -> Result<(), SyncError> {
        self.call_ids("torrent-verify", ids).await
    }

    pub async fn torrent_remove(&self, ids: &[i64], delete_local_data: bool) -> Result<(), SyncError> {
        self.call(
            "torrent-remove",
            Some(json!({ "ids": ids, "delete-local-data": delete_local_data })),
        )
        .await?;
        Ok(())
    }

    pub async fn torrent_set(&self, ids: &[i64], properties: &TorrentProperties) -> Result<(), SyncError> {
        let mut arguments = serde_json::to_value(properties)?;
        if let Value::Object(map) = &mut arguments {
            map.insert("ids".to_string(), json!(ids));
        }
        self.call("torrent-set", Some(arguments)).await?;
        Ok(())
    }

    pub async fn torrent_set_location(&self, ids: &[i64], location: &str, move_data: bool) -> Result<(), SyncError> {
        self.call(
            "torrent-set-location",
            Some(json!({ "ids": ids, "location": location, "move": move_data })),
        )
        .await?;
        Ok(())
    }

    pub async fn torrent_rename_path(&self, ids: &[i64], path: &str, name: &str) -> Result<(), SyncError> {
        self.call(
            "torrent-rename-path",
            Some(json!({ "ids": ids, "path": path, "name": name })),
        )
        .await?;
        Ok(())
    }

    pub async fn queue_move(&self, ids: &[i64], direction: QueueMove) -> Result<(), SyncError> {
        self.call_ids(direction.method(), ids).await
    }

    pub async fn free_space(&self, path: &str) -> Result<FreeSpace, SyncError> {
        let arguments = self
            .call_arguments("free-space", Some(json!({ "path": path })))
            .await?;
        Ok(serde_json::from_value(arguments)?)
    }

    /// Probe the daemon before persisting a new connection config.
    ///
    /// Unlike every other call path, failures here are returned to the caller
    /// so setup can tell bad credentials from an unreachable daemon.
    pub async fn test_connection(&self) -> Result<Value, ConnectionFailure> {
        self.session_get(None).await.map_err(ConnectionFailure::from)
    }
}

/// One undecodable entry is skipped rather than failing the whole list
fn decode_torrent(value: Value) -> Option<Torrent> {
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    match serde_json::from_value(value) {
        Ok(torrent) => Some(torrent),
        Err(e) => {
            warn!(torrent_id = %id, error = %e, "Skipping torrent that failed to decode");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::models::rpc::{AddTorrent, QueueMove, TorrentProperties};
    use crate::rpc::transport::{RpcTransport, TransportSettings, RPC_PATH};
    use crate::core::error::ConnectionFailure;
    use serde_json::{json, Value};
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, RpcTransport) {
        let server = MockServer::start().await;
        let transport = RpcTransport::new(
            TransportSettings {
                url: format!("{}{}", server.uri(), RPC_PATH),
                ..TransportSettings::default()
            },
            Duration::from_secs(5),
        )
        .unwrap();
        (server, transport)
    }

    fn ok(arguments: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"result": "success", "arguments": arguments}))
    }

    async fn last_body(server: &MockServer) -> Value {
        let requests = server.received_requests().await.unwrap();
        serde_json::from_slice(&requests.last().unwrap().body).unwrap()
    }

    #[tokio::test]
    async fn test_torrent_get_decodes_list() {
        let (server, transport) = setup().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "torrent-get"})))
            .respond_with(ok(json!({"torrents": [{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]})))
            .mount(&server)
            .await;

        let torrents = transport.torrent_get(&["id", "name"]).await.unwrap();
        assert_eq!(torrents.len(), 2);
        assert_eq!(torrents[1].name, "b");
        assert_eq!(last_body(&server).await["arguments"]["fields"], json!(["id", "name"]));
    }

    #[tokio::test]
    async fn test_torrent_get_skips_undecodable_entry() {
        let (server, transport) = setup().await;
        Mock::given(method("POST"))
            .respond_with(ok(json!({"torrents": [
                {"id": 1, "name": "a", "status": 42},
                {"id": 2, "name": "b", "status": 6}
            ]})))
            .mount(&server)
            .await;

        let torrents = transport.torrent_get(&["id", "name", "status"]).await.unwrap();
        assert_eq!(torrents.len(), 1);
        assert_eq!(torrents[0].id, 2);
    }

    #[tokio::test]
    async fn test_remove_sends_delete_flag() {
        let (server, transport) = setup().await;
        Mock::given(method("POST")).respond_with(ok(json!({}))).mount(&server).await;

        transport.torrent_remove(&[7], true).await.unwrap();
        let body = last_body(&server).await;
        assert_eq!(body["method"], "torrent-remove");
        assert_eq!(body["arguments"], json!({"ids": [7], "delete-local-data": true}));
    }

    #[tokio::test]
    async fn test_torrent_set_merges_ids() {
        let (server, transport) = setup().await;
        Mock::given(method("POST")).respond_with(ok(json!({}))).mount(&server).await;

        let props = TorrentProperties {
            upload_limit: Some(50),
            upload_limited: Some(true),
            ..TorrentProperties::default()
        };
        transport.torrent_set(&[4], &props).await.unwrap();
        assert_eq!(
            last_body(&server).await["arguments"],
            json!({"ids": [4], "uploadLimit": 50, "uploadLimited": true})
        );
    }

    #[tokio::test]
    async fn test_add_and_queue_and_location() {
        let (server, transport) = setup().await;
        Mock::given(method("POST"))
            .respond_with(ok(json!({"torrent-added": {"id": 9}})))
            .mount(&server)
            .await;

        let added = transport.torrent_add(&AddTorrent::magnet("magnet:?xt=1")).await.unwrap();
        assert_eq!(added["torrent-added"]["id"], 9);

        transport.queue_move(&[1, 2], QueueMove::Up).await.unwrap();
        assert_eq!(last_body(&server).await["method"], "queue-move-up");

        transport.torrent_set_location(&[1], "/data", true).await.unwrap();
        assert_eq!(
            last_body(&server).await["arguments"],
            json!({"ids": [1], "location": "/data", "move": true})
        );

        transport.torrent_rename_path(&[1], "old", "new").await.unwrap();
        assert_eq!(last_body(&server).await["method"], "torrent-rename-path");
    }

    #[tokio::test]
    async fn test_free_space() {
        let (server, transport) = setup().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "free-space", "arguments": {"path": "/data"}})))
            .respond_with(ok(json!({"path": "/data", "size-bytes": 100, "total_size": 300})))
            .mount(&server)
            .await;

        let space = transport.free_space("/data").await.unwrap();
        assert_eq!(space.size_bytes, 100);
        assert_eq!(space.used_bytes(), 200);
    }

    #[tokio::test]
    async fn test_connection_test_classifies_auth_failure() {
        let (server, transport) = setup().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = transport.test_connection().await.unwrap_err();
        assert!(matches!(err, ConnectionFailure::Authentication));
    }

    #[tokio::test]
    async fn test_connection_test_refused() {
        // Bind and drop a listener to get a port nothing listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = RpcTransport::new(
            TransportSettings {
                url: "127.0.0.1".to_string(),
                port,
                ..TransportSettings::default()
            },
            Duration::from_secs(5),
        )
        .unwrap();

        let err = transport.test_connection().await.unwrap_err();
        assert!(matches!(err, ConnectionFailure::ConnectionRefused));
    }
}
