use crate::core::error::ErrorResponse;
use axum::{
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};

pub async fn fallback_handler(uri: Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("No route for {}. Valid endpoints: /config, /health", uri.path()),
        }),
    )
        .into_response()
}
