// HTTP routes of the config service

use crate::core::state::AppState;
use crate::handlers::{config, fallback, health};
use crate::security::rate_limiter::rate_limit;
use axum::{middleware, routing::get, Router};
use std::sync::Arc;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/config",
            get(config::get_config_handler)
                .post(config::save_config_handler)
                .delete(config::delete_config_handler),
        )
        .route_layer(middleware::from_fn_with_state(Arc::clone(&state), rate_limit))
        .route("/health", get(health::health_handler))

        // 404 fallback for all unmatched routes
        .fallback(fallback::fallback_handler)

        .with_state(state)
}
