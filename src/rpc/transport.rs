use crate::core::error::SyncError;
use crate::models::config::TransmissionConfig;
use crate::models::rpc::{RpcRequest, RpcResponse};
use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fixed path of the daemon's RPC endpoint
pub const RPC_PATH: &str = "/transmission/rpc";

/// Header carrying the CSRF session token
pub const SESSION_ID_HEADER: &str = "X-Transmission-Session-Id";

pub const DEFAULT_PORT: u16 = 9091;

/// Endpoint and credentials of the daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub url: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            port: DEFAULT_PORT,
            username: None,
            password: None,
        }
    }
}

impl TransportSettings {
    /// Full RPC URL, or `None` when no host is configured.
    ///
    /// Hosts without a scheme get `http://`; anything not already ending in
    /// the RPC path gets `:{port}/transmission/rpc` appended.
    pub fn base_url(&self) -> Option<String> {
        let url = self.url.trim();
        if url.is_empty() {
            return None;
        }

        let mut base = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("http://{}", url)
        };

        if !base.ends_with(RPC_PATH) {
            base = format!("{}:{}{}", base, self.port, RPC_PATH);
        }

        Some(base)
    }

    pub fn from_config(config: &TransmissionConfig) -> Self {
        Self {
            url: config.base_url(),
            port: config.port,
            username: non_empty(&config.username),
            password: non_empty(&config.password),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Active endpoint; `epoch` changes on every reconfiguration
#[derive(Debug, Clone)]
struct Endpoint {
    settings: TransportSettings,
    base_url: Option<String>,
    epoch: u64,
}

#[derive(Debug, Default)]
struct SessionToken {
    value: Option<String>,
    /// Endpoint epoch the token was issued for
    epoch: u64,
}

/// Authenticated request/response exchange with the daemon
pub struct RpcTransport {
    client: reqwest::Client,
    endpoint: RwLock<Endpoint>,
    token: Mutex<SessionToken>,
    tag: AtomicU64,
}

impl RpcTransport {
    pub fn new(settings: TransportSettings, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = settings.base_url();

        Ok(Self {
            client,
            endpoint: RwLock::new(Endpoint {
                settings,
                base_url,
                epoch: 0,
            }),
            token: Mutex::new(SessionToken::default()),
            tag: AtomicU64::new(0),
        })
    }

    /// Transport with no daemon configured yet
    pub fn unconfigured(timeout: Duration) -> Result<Self> {
        Self::new(TransportSettings::default(), timeout)
    }

    /// Point the transport at a new endpoint and drop the cached session token
    pub fn update_settings(&self, settings: TransportSettings) {
        let mut token = lock(&self.token);
        let mut endpoint = self.endpoint.write().unwrap_or_else(PoisonError::into_inner);

        endpoint.base_url = settings.base_url();
        endpoint.settings = settings;
        endpoint.epoch += 1;

        token.value = None;
        token.epoch = endpoint.epoch;

        info!(
            endpoint = endpoint.base_url.as_deref().unwrap_or("<none>"),
            "RPC transport reconfigured"
        );
    }

    pub fn settings(&self) -> TransportSettings {
        self.endpoint
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .settings
            .clone()
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .base_url
            .is_some()
    }

    /// Currently held session token, if any
    pub fn session_id(&self) -> Option<String> {
        lock(&self.token).value.clone()
    }

    /// Issue one RPC call.
    ///
    /// A 409 answer installs the session token it carries and the request is
    /// retried exactly once; a second 409 is `AuthRetryExhausted`.
    pub async fn call(&self, method: &str, arguments: Option<Value>) -> Result<RpcResponse, SyncError> {
        let endpoint = self
            .endpoint
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let url = endpoint.base_url.as_deref().ok_or(SyncError::NotConfigured)?;

        let tag = self.tag.fetch_add(1, Ordering::Relaxed) + 1;
        let request = RpcRequest {
            method,
            arguments: arguments.as_ref(),
            tag,
        };

        let token = self.current_token(endpoint.epoch);
        let mut response = self
            .send(url, &endpoint.settings, &request, token.as_deref())
            .await?;

        if response.status() == StatusCode::CONFLICT {
            let fresh = response
                .headers()
                .get(SESSION_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
                .ok_or(SyncError::HttpStatus(StatusCode::CONFLICT))?;

            let token = self.refresh_token(endpoint.epoch, token.as_deref(), fresh);
            debug!(method, tag, "Session id refreshed, retrying request");

            response = self.send(url, &endpoint.settings, &request, Some(&token)).await?;

            if response.status() == StatusCode::CONFLICT {
                warn!(method, tag, "Daemon rejected the refreshed session id");
                return Err(SyncError::AuthRetryExhausted);
            }
        }

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatus(status));
        }

        let bytes = response.bytes().await?;
        let parsed: RpcResponse = serde_json::from_slice(&bytes)?;

        if !parsed.is_success() {
            debug!(method, tag, result = %parsed.result, "RPC call failed");
            return Err(SyncError::Rpc {
                result: parsed.result,
            });
        }

        Ok(parsed)
    }

    async fn send(
        &self,
        url: &str,
        settings: &TransportSettings,
        request: &RpcRequest<'_>,
        token: Option<&str>,
    ) -> Result<reqwest::Response, SyncError> {
        let mut builder = self.client.post(url).json(request);

        if let Some(username) = &settings.username {
            builder = builder.basic_auth(username, settings.password.as_ref());
        }

        if let Some(token) = token {
            builder = builder.header(SESSION_ID_HEADER, token);
        }

        Ok(builder.send().await?)
    }

    fn current_token(&self, epoch: u64) -> Option<String> {
        let token = lock(&self.token);
        if token.epoch == epoch {
            token.value.clone()
        } else {
            None
        }
    }

    /// Install `fresh` unless another caller already replaced the token we
    /// sent, or the endpoint changed while the request was in flight.
    fn refresh_token(&self, epoch: u64, sent: Option<&str>, fresh: String) -> String {
        let mut token = lock(&self.token);

        if token.epoch != epoch {
            return fresh;
        }

        if let Some(current) = &token.value {
            if Some(current.as_str()) != sent {
                return current.clone();
            }
        }

        token.value = Some(fresh.clone());
        fresh
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings_for(server: &MockServer) -> TransportSettings {
        TransportSettings {
            url: format!("{}{}", server.uri(), RPC_PATH),
            ..TransportSettings::default()
        }
    }

    fn transport_for(server: &MockServer) -> RpcTransport {
        RpcTransport::new(settings_for(server), Duration::from_secs(5)).unwrap()
    }

    fn success() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"result": "success", "arguments": {}}))
    }

    fn conflict(token: &str) -> ResponseTemplate {
        ResponseTemplate::new(409).insert_header(SESSION_ID_HEADER, token)
    }

    #[test]
    fn test_base_url_defaults_scheme_and_suffix() {
        let settings = TransportSettings {
            url: "nas.local".to_string(),
            port: 9091,
            ..TransportSettings::default()
        };
        assert_eq!(
            settings.base_url().as_deref(),
            Some("http://nas.local:9091/transmission/rpc")
        );
    }

    #[test]
    fn test_base_url_keeps_scheme_and_existing_suffix() {
        let settings = TransportSettings {
            url: "https://nas.local:443/transmission/rpc".to_string(),
            port: 9091,
            ..TransportSettings::default()
        };
        assert_eq!(
            settings.base_url().as_deref(),
            Some("https://nas.local:443/transmission/rpc")
        );
    }

    #[test]
    fn test_empty_url_is_unconfigured() {
        assert_eq!(TransportSettings::default().base_url(), None);
    }

    #[test]
    fn test_settings_from_config() {
        let config = TransmissionConfig {
            url: "nas.local".to_string(),
            port: 9092,
            username: "admin".to_string(),
            password: String::new(),
            is_secure: true,
        };
        let settings = TransportSettings::from_config(&config);
        assert_eq!(
            settings.base_url().as_deref(),
            Some("https://nas.local:9092/transmission/rpc")
        );
        assert_eq!(settings.username.as_deref(), Some("admin"));
        assert_eq!(settings.password, None);
    }

    #[tokio::test]
    async fn test_call_without_endpoint_fails() {
        let transport = RpcTransport::unconfigured(Duration::from_secs(1)).unwrap();
        let err = transport.call("session-get", None).await.unwrap_err();
        assert!(matches!(err, SyncError::NotConfigured));
    }

    #[tokio::test]
    async fn test_conflict_then_success_retries_once_with_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(RPC_PATH))
            .and(header(SESSION_ID_HEADER, "token-1"))
            .respond_with(success())
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(RPC_PATH))
            .respond_with(conflict("token-1"))
            .with_priority(2)
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let response = transport.call("session-get", None).await.unwrap();
        assert!(response.is_success());

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].headers.get(SESSION_ID_HEADER).is_none());
        assert_eq!(requests[1].headers.get(SESSION_ID_HEADER).unwrap(), "token-1");
        assert_eq!(transport.session_id().as_deref(), Some("token-1"));
    }

    #[tokio::test]
    async fn test_second_conflict_is_fatal() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(RPC_PATH))
            .respond_with(conflict("token-1"))
            .expect(2)
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let err = transport.call("session-get", None).await.unwrap_err();
        assert!(matches!(err, SyncError::AuthRetryExhausted));
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_token_reused_on_later_calls() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(header(SESSION_ID_HEADER, "token-1"))
            .respond_with(success())
            .with_priority(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .respond_with(conflict("token-1"))
            .with_priority(2)
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        transport.call("session-get", None).await.unwrap();
        transport.call("session-stats", None).await.unwrap();

        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_request_body_and_tags() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(success()).mount(&server).await;

        let transport = transport_for(&server);
        transport
            .call("torrent-stop", Some(json!({"ids": [3]})))
            .await
            .unwrap();
        transport.call("session-stats", None).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let first: Value = serde_json::from_slice(&requests[0].body).unwrap();
        let second: Value = serde_json::from_slice(&requests[1].body).unwrap();
        assert_eq!(first, json!({"method": "torrent-stop", "arguments": {"ids": [3]}, "tag": 1}));
        assert_eq!(second["tag"], 2);
    }

    #[tokio::test]
    async fn test_non_success_result_is_rpc_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"result": "duplicate torrent"})),
            )
            .mount(&server)
            .await;

        let err = transport_for(&server).call("torrent-add", None).await.unwrap_err();
        match err {
            SyncError::Rpc { result } => assert_eq!(result, "duplicate torrent"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = transport_for(&server).call("session-get", None).await.unwrap_err();
        assert!(matches!(err, SyncError::HttpStatus(StatusCode::UNAUTHORIZED)));
    }

    #[tokio::test]
    async fn test_basic_auth_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Basic YWRtaW46c2VjcmV0"))
            .respond_with(success())
            .expect(1)
            .mount(&server)
            .await;

        let settings = TransportSettings {
            username: Some("admin".to_string()),
            password: Some("secret".to_string()),
            ..settings_for(&server)
        };
        let transport = RpcTransport::new(settings, Duration::from_secs(5)).unwrap();
        transport.call("session-get", None).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_settings_drops_token() {
        let first = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header(SESSION_ID_HEADER, "token-1"))
            .respond_with(success())
            .with_priority(1)
            .mount(&first)
            .await;
        Mock::given(method("POST"))
            .respond_with(conflict("token-1"))
            .with_priority(2)
            .mount(&first)
            .await;

        let second = MockServer::start().await;
        Mock::given(method("POST")).respond_with(success()).mount(&second).await;

        let transport = transport_for(&first);
        transport.call("session-get", None).await.unwrap();
        assert!(transport.session_id().is_some());

        transport.update_settings(settings_for(&second));
        assert!(transport.session_id().is_none());

        transport.call("session-get", None).await.unwrap();
        let requests = second.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].headers.get(SESSION_ID_HEADER).is_none());
    }

    #[test]
    fn test_refresh_keeps_token_installed_by_another_caller() {
        let transport = RpcTransport::unconfigured(Duration::from_secs(1)).unwrap();

        let installed = transport.refresh_token(0, None, "token-a".to_string());
        assert_eq!(installed, "token-a");

        // A caller that sent no token races in with a different fresh token
        let reused = transport.refresh_token(0, None, "token-b".to_string());
        assert_eq!(reused, "token-a");
        assert_eq!(transport.session_id().as_deref(), Some("token-a"));
    }

    #[test]
    fn test_refresh_from_stale_endpoint_is_not_installed() {
        let transport = RpcTransport::unconfigured(Duration::from_secs(1)).unwrap();
        transport.update_settings(TransportSettings {
            url: "nas.local".to_string(),
            ..TransportSettings::default()
        });

        let token = transport.refresh_token(0, None, "old-endpoint".to_string());
        assert_eq!(token, "old-endpoint");
        assert!(transport.session_id().is_none());
    }
}
