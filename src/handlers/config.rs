use crate::core::error::ConfigStoreError;
use crate::core::state::AppState;
use crate::models::config::TransmissionConfig;
use crate::stores::config_store::ConfigStore;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::{info, warn};

/// GET /config
///
/// The stored connection config, or `null` when nothing is stored.
pub async fn get_config_handler(State(state): State<Arc<AppState>>) -> Json<Option<TransmissionConfig>> {
    Json(state.store.get())
}

/// POST /config
///
/// Validates and stores the body, echoing what was stored.
pub async fn save_config_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TransmissionConfig>, JsonRejection>,
) -> Result<Json<TransmissionConfig>, ConfigStoreError> {
    let Json(config) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Rejected config payload");
        ConfigStoreError::InvalidConfig(rejection.body_text())
    })?;

    config.validate().map_err(ConfigStoreError::InvalidConfig)?;

    let stored = with_store(&state, move |store| store.save(config)).await?;

    Ok(Json(stored))
}

/// DELETE /config
pub async fn delete_config_handler(State(state): State<Arc<AppState>>) -> Result<StatusCode, ConfigStoreError> {
    with_store(&state, |store| store.clear()).await?;

    info!("Stored config deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Run a store write on the blocking pool
async fn with_store<T, F>(state: &AppState, write: F) -> Result<T, ConfigStoreError>
where
    F: FnOnce(&ConfigStore) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || write(&store))
        .await
        .map_err(|e| ConfigStoreError::WriteFailed(e.to_string()))?
        .map_err(|e| ConfigStoreError::WriteFailed(format!("{:#}", e)))
}
