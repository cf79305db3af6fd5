// Centralized error handling for the sync core and the config service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Errors raised while talking to the daemon
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Daemon returned HTTP status {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error("RPC call failed: {result}")]
    Rpc { result: String },

    #[error("Invalid response: {0}")]
    Validation(String),

    #[error("Session id rejected after re-authentication")]
    AuthRetryExhausted,

    #[error("Client not initialized - no daemon URL configured")]
    NotConfigured,

    #[error("No session info available")]
    MissingSessionInfo,

    #[error("Polling is already running")]
    AlreadyPolling,

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Coarse error category observers use to pick a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Transport,
    Rpc,
    Validation,
    AuthRetryExhausted,
    Configuration,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Transport(_) | SyncError::HttpStatus(_) => ErrorKind::Transport,
            SyncError::Rpc { .. } => ErrorKind::Rpc,
            SyncError::Validation(_) | SyncError::Decode(_) => ErrorKind::Validation,
            SyncError::AuthRetryExhausted => ErrorKind::AuthRetryExhausted,
            SyncError::NotConfigured | SyncError::MissingSessionInfo | SyncError::AlreadyPolling => ErrorKind::Configuration,
        }
    }
}

/// Error value published to observers instead of being thrown at them
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedError {
    pub kind: ErrorKind,
    pub message: String,
    /// Unix timestamp (seconds)
    pub at: i64,
}

impl From<&SyncError> for RecordedError {
    fn from(error: &SyncError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            at: crate::utils::time::current_timestamp(),
        }
    }
}

/// Why a setup-time connection test failed
#[derive(Error, Debug)]
pub enum ConnectionFailure {
    #[error("Authentication failed. Please check your username and password.")]
    Authentication,

    #[error("Connection refused. Please check if Transmission is running and the port is correct.")]
    ConnectionRefused,

    #[error("Network error. Please check your host and port settings.")]
    Network,

    #[error("{0}")]
    Other(SyncError),
}

impl From<SyncError> for ConnectionFailure {
    fn from(error: SyncError) -> Self {
        match &error {
            SyncError::HttpStatus(status) if *status == reqwest::StatusCode::UNAUTHORIZED => {
                ConnectionFailure::Authentication
            }
            SyncError::Transport(e) if e.is_connect() => ConnectionFailure::ConnectionRefused,
            SyncError::Transport(e) if e.is_timeout() || e.is_request() => ConnectionFailure::Network,
            _ => ConnectionFailure::Other(error),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Errors returned by the config service endpoints
#[derive(Error, Debug)]
pub enum ConfigStoreError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Too many requests")]
    RateLimited,

    #[error("Failed to read configuration: {0}")]
    ReadFailed(String),

    #[error("Failed to write configuration: {0}")]
    WriteFailed(String),
}

impl IntoResponse for ConfigStoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            ConfigStoreError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            ConfigStoreError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ConfigStoreError::ReadFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ConfigStoreError::WriteFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
