use crate::core::error::ConfigStoreError;
use crate::core::state::AppState;
use crate::utils::time::current_timestamp;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Fixed-window request counter per client address
pub struct RateLimiter {
    requests: DashMap<IpAddr, (AtomicU32, AtomicI64)>,
    max_requests: u32,
    window_secs: i64,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: i64) -> Self {
        Self {
            requests: DashMap::new(),
            max_requests,
            window_secs,
        }
    }

    pub fn check_and_increment(&self, ip: IpAddr, current_time: i64) -> bool {
        let entry = self
            .requests
            .entry(ip)
            .or_insert_with(|| (AtomicU32::new(0), AtomicI64::new(current_time)));

        let (count, window_start) = entry.value();

        if current_time - window_start.load(Ordering::Relaxed) >= self.window_secs {
            window_start.store(current_time, Ordering::Relaxed);
            count.store(1, Ordering::Relaxed);
            return true;
        }

        count.fetch_add(1, Ordering::Relaxed) + 1 <= self.max_requests
    }

    pub fn cleanup_old_entries(&self, current_time: i64) {
        self.requests.retain(|_, (_, window_start)| {
            current_time - window_start.load(Ordering::Relaxed) < self.window_secs
        });
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// Reject clients that exceeded their request budget.
///
/// Requests without a peer address (in-process callers) are not counted.
pub async fn rate_limit(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    if let Some(ip) = peer {
        if !state.rate_limiter.check_and_increment(ip, current_timestamp()) {
            warn!(ip = %ip, "Config service rate limit exceeded");
            return ConfigStoreError::RateLimited.into_response();
        }
    }

    next.run(request).await
}
